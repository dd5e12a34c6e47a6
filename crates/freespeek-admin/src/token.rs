//! Session token decoding
//!
//! The backend issues signed JWTs. The console cannot verify the signature
//! (it holds no key) and does not need to: it only reads the `exp` claim to
//! decide locally whether a token is still worth presenting. The backend
//! stays the authority and rejects anything it does not like with a 401.

use std::fmt;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is empty")]
    Empty,

    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("token has no usable expiry claim")]
    MissingExpiry,

    #[error("token expired at {0}")]
    Expired(DateTime<Utc>),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::MissingRequiredClaim(claim) if claim == "exp" => TokenError::MissingExpiry,
            _ => TokenError::Malformed(e.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<i64>,
}

/// A bearer token together with its decoded expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    raw: String,
    expires_at: DateTime<Utc>,
}

impl SessionToken {
    /// Decode the expiry claim without judging it.
    pub fn parse(raw: &str) -> Result<Self, TokenError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TokenError::Empty);
        }

        // No key on this side; expiry is checked against our own clock below.
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(raw, &DecodingKey::from_secret(&[]), &validation)?;
        let seconds = data.claims.exp.ok_or(TokenError::MissingExpiry)?;
        let expires_at = DateTime::<Utc>::from_timestamp(seconds, 0).ok_or(TokenError::MissingExpiry)?;

        Ok(Self {
            raw: raw.to_string(),
            expires_at,
        })
    }

    /// Decode and require the expiry to be strictly after `now`.
    pub fn validate_at(raw: &str, now: DateTime<Utc>) -> Result<Self, TokenError> {
        let token = Self::parse(raw)?;
        if token.is_valid_at(now) {
            Ok(token)
        } else {
            Err(TokenError::Expired(token.expires_at))
        }
    }

    pub fn validate(raw: &str) -> Result<Self, TokenError> {
        Self::validate_at(raw, Utc::now())
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

// Never print the credential itself.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("raw", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn unsigned_token(claims: serde_json::Value) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    encode(&Header::default(), &claims, &EncodingKey::from_secret(b"console-test"))
        .expect("encode test token")
}
