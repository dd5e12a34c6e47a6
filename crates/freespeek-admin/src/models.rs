//! User records shared by the session and admin APIs

use serde::{Deserialize, Serialize};

const DEFAULT_ROLE: &str = "admin";

/// The authenticated console user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
}

impl User {
    /// Minimal record for a backend that confirmed the credentials but sent
    /// no profile.
    pub fn from_email(email: &str) -> Self {
        let email = email.trim();
        let name = email.split('@').next().unwrap_or(email).to_string();
        Self {
            id: email.to_string(),
            email: email.to_string(),
            name,
            role: DEFAULT_ROLE.to_string(),
        }
    }
}

/// User object as the backend sends it. Field names drift between
/// endpoints, so everything is optional and resolved in [`UserRecord::resolve`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default, rename = "_id")]
    pub mongo_id: Option<serde_json::Value>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(default, rename = "lastName")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl UserRecord {
    /// Build a [`User`], filling gaps from `fallback_email`.
    ///
    /// Returns `None` when neither the record nor the fallback carries an
    /// identity.
    pub fn resolve(&self, fallback_email: Option<&str>) -> Option<User> {
        let email = non_empty(self.email.as_deref())
            .or_else(|| non_empty(fallback_email))
            .map(str::to_string);

        let id = self
            .id
            .as_ref()
            .or(self.mongo_id.as_ref())
            .and_then(json_id)
            .or_else(|| email.clone())?;

        let email = email.unwrap_or_default();

        let full_name = match (non_empty(self.first_name.as_deref()), non_empty(self.last_name.as_deref())) {
            (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
            (Some(first), None) => Some(first.to_string()),
            (None, Some(last)) => Some(last.to_string()),
            (None, None) => None,
        };

        let name = non_empty(self.display_name.as_deref())
            .or_else(|| non_empty(self.name.as_deref()))
            .map(str::to_string)
            .or(full_name)
            .or_else(|| non_empty(self.username.as_deref()).map(str::to_string))
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        let role = non_empty(self.role.as_deref()).unwrap_or(DEFAULT_ROLE).to_string();

        Some(User { id, email, name, role })
    }
}

/// Current-user payloads seen in the wild: `{user}`, `{data: ...}` (possibly
/// success-wrapped) or the bare record.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserEnvelope {
    Wrapped { user: UserRecord },
    Data { data: Box<UserEnvelope> },
    Bare(UserRecord),
}

impl UserEnvelope {
    pub fn into_record(self) -> UserRecord {
        match self {
            UserEnvelope::Wrapped { user } => user,
            UserEnvelope::Data { data } => data.into_record(),
            UserEnvelope::Bare(record) => record,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn json_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
