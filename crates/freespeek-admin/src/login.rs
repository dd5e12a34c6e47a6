//! Login response shapes and credential extraction
//!
//! The login endpoint has answered in several layouts over time:
//!
//! - bare: `{ "token": "...", "user": { ... } }`
//! - nested: `{ "data": { "token": "...", "user": { ... } } }`
//! - success-wrapped: `{ "success": true, "data": { "token": "...", "user": { ... } } }`
//!   (or with `token`/`user` next to `success`)
//!
//! [`LoginResponse`] names each layout and [`extract_credentials`] turns any
//! of them into a token plus user, or an [`ExtractionError`].

use serde::Deserialize;
use thiserror::Error;

use crate::error::Error;
use crate::models::{User, UserRecord};

/// The token/user pair inside `data` (or at the top level).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginPayload {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, rename = "accessToken")]
    pub access_token: Option<String>,
    #[serde(default)]
    pub user: Option<UserRecord>,
}

impl LoginPayload {
    fn token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .or(self.access_token.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Recognized login response layouts. Variant order matters for untagged
/// matching: anything carrying `success` is an envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LoginResponse {
    Envelope {
        success: bool,
        #[serde(default)]
        data: Option<LoginPayload>,
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        user: Option<UserRecord>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
    Nested {
        data: LoginPayload,
    },
    Bare {
        token: String,
        #[serde(default)]
        user: Option<UserRecord>,
    },
    Unrecognized(serde_json::Value),
}

/// What a successful login yields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub user: User,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("login rejected: {0:?}")]
    Rejected(Option<String>),

    #[error("no token in login response")]
    MissingToken,

    #[error("unrecognized login response")]
    Unrecognized,
}

impl ExtractionError {
    /// Message suitable for the login form
    pub fn user_message(&self) -> String {
        match self {
            ExtractionError::Rejected(Some(message)) if !message.trim().is_empty() => message.clone(),
            ExtractionError::Rejected(_) => "Invalid email or password".to_string(),
            ExtractionError::MissingToken => "Login failed: the server did not return a session token".to_string(),
            ExtractionError::Unrecognized => "Login failed: unexpected response from the server".to_string(),
        }
    }
}

impl From<ExtractionError> for Error {
    fn from(err: ExtractionError) -> Self {
        Error::Authentication(err.user_message())
    }
}

/// Pull token and user out of any recognized layout.
///
/// A missing user becomes a minimal record built from `submitted_email`.
pub fn extract_credentials(
    response: &LoginResponse,
    submitted_email: &str,
) -> Result<Credentials, ExtractionError> {
    let (token, user) = match response {
        LoginResponse::Envelope {
            success,
            data,
            token,
            user,
            message,
            error,
        } => {
            if !success {
                return Err(ExtractionError::Rejected(message.clone().or_else(|| error.clone())));
            }
            let data = data.as_ref();
            let token = data
                .and_then(LoginPayload::token)
                .or_else(|| token.as_deref().map(str::trim).filter(|t| !t.is_empty()));
            let user = data.and_then(|d| d.user.as_ref()).or(user.as_ref());
            (token, user)
        }
        LoginResponse::Nested { data } => (data.token(), data.user.as_ref()),
        LoginResponse::Bare { token, user } => {
            (Some(token.trim()).filter(|t| !t.is_empty()), user.as_ref())
        }
        LoginResponse::Unrecognized(_) => return Err(ExtractionError::Unrecognized),
    };

    let token = token.ok_or(ExtractionError::MissingToken)?.to_string();
    let user = user
        .and_then(|record| record.resolve(Some(submitted_email)))
        .unwrap_or_else(|| User::from_email(submitted_email));

    Ok(Credentials { token, user })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> LoginResponse {
        serde_json::from_value(value).unwrap()
    }

    fn user_json() -> serde_json::Value {
        json!({ "id": "u1", "email": "a@b.com", "name": "Admin", "role": "superadmin" })
    }

    #[test]
    fn test_all_shapes_yield_same_credentials() {
        let shapes = vec![
            json!({ "token": "T", "user": user_json() }),
            json!({ "data": { "token": "T", "user": user_json() } }),
            json!({ "success": true, "data": { "token": "T", "user": user_json() } }),
            json!({ "success": true, "token": "T", "user": user_json() }),
        ];

        let expected = Credentials {
            token: "T".into(),
            user: User {
                id: "u1".into(),
                email: "a@b.com".into(),
                name: "Admin".into(),
                role: "superadmin".into(),
            },
        };

        for shape in shapes {
            let response = parse(shape.clone());
            assert_eq!(extract_credentials(&response, "a@b.com").unwrap(), expected, "{}", shape);
        }
    }

    #[test]
    fn test_variant_selection() {
        assert!(matches!(parse(json!({ "token": "T" })), LoginResponse::Bare { .. }));
        assert!(matches!(parse(json!({ "data": { "token": "T" } })), LoginResponse::Nested { .. }));
        assert!(matches!(parse(json!({ "success": true, "data": {} })), LoginResponse::Envelope { .. }));
        assert!(matches!(parse(json!({ "ok": 1 })), LoginResponse::Unrecognized(_)));
        assert!(matches!(parse(json!({ "token": 42 })), LoginResponse::Unrecognized(_)));
    }

    #[test]
    fn test_missing_user_falls_back_to_email() {
        let response = parse(json!({ "data": { "token": "T" } }));
        let credentials = extract_credentials(&response, "ops@freespeek.app").unwrap();
        assert_eq!(credentials.user, User::from_email("ops@freespeek.app"));
    }

    #[test]
    fn test_access_token_field() {
        let response = parse(json!({ "success": true, "data": { "accessToken": "A" } }));
        assert_eq!(extract_credentials(&response, "a@b.com").unwrap().token, "A");
    }

    #[test]
    fn test_no_token() {
        for shape in [
            json!({ "success": true, "data": { "user": user_json() } }),
            json!({ "data": { "token": "" } }),
            json!({ "token": "   " }),
        ] {
            let response = parse(shape);
            assert_eq!(
                extract_credentials(&response, "a@b.com"),
                Err(ExtractionError::MissingToken)
            );
        }
        assert_eq!(
            extract_credentials(&parse(json!({ "message": "hi" })), "a@b.com"),
            Err(ExtractionError::Unrecognized)
        );
    }

    #[test]
    fn test_rejected_envelope_keeps_message() {
        let response = parse(json!({ "success": false, "message": "Account suspended" }));
        let err = extract_credentials(&response, "a@b.com").unwrap_err();
        assert_eq!(err, ExtractionError::Rejected(Some("Account suspended".into())));
        assert_eq!(err.user_message(), "Account suspended");

        let response = parse(json!({ "success": false }));
        let err: Error = extract_credentials(&response, "a@b.com").unwrap_err().into();
        assert!(matches!(err, Error::Authentication(ref m) if m == "Invalid email or password"));
    }
}
