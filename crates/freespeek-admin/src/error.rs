//! Error types for the admin console core

use std::time::Duration;
use thiserror::Error;

/// Result type alias for admin console operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the admin console core
#[derive(Error, Debug)]
pub enum Error {
    /// Credential exchange rejected or yielded no usable token.
    /// The message is shown to the user as-is.
    #[error("{0}")]
    Authentication(String),

    /// The backend rejected the attached bearer token (401)
    #[error("Session rejected: {0}")]
    Unauthorized(String),

    /// Authorization failed (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error (400 / 422)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rate limit exceeded (429)
    #[error("Rate limit exceeded: retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Server error (5xx)
    #[error("Server error: {0}")]
    Server(String),

    /// HTTP request failed before a response arrived
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Token persistence failed
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Operation exceeded its time budget
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RateLimited { .. } | Error::Server(_))
    }

    /// Whether the backend refused the session token
    pub fn is_session_rejection(&self) -> bool {
        matches!(self, Error::Unauthorized(_))
    }

    /// Create an error from an HTTP status code and message
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 | 422 => Error::Validation(message),
            401 => Error::Unauthorized(message),
            403 => Error::Forbidden(message),
            404 => Error::NotFound(message),
            429 => Error::RateLimited { retry_after: None },
            500..=599 => Error::Server(message),
            _ => Error::Other(format!("HTTP {}: {}", status, message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            Error::from_status(StatusCode::UNAUTHORIZED, "expired".into()),
            Error::Unauthorized(_)
        ));
        assert!(matches!(
            Error::from_status(StatusCode::UNPROCESSABLE_ENTITY, "bad".into()),
            Error::Validation(_)
        ));
        assert!(matches!(
            Error::from_status(StatusCode::BAD_GATEWAY, "down".into()),
            Error::Server(_)
        ));
        assert!(matches!(
            Error::from_status(StatusCode::IM_A_TEAPOT, "tea".into()),
            Error::Other(_)
        ));
    }

    #[test]
    fn test_retryable() {
        assert!(Error::Server("x".into()).is_retryable());
        assert!(Error::RateLimited { retry_after: None }.is_retryable());
        assert!(!Error::Unauthorized("x".into()).is_retryable());
        assert!(Error::Unauthorized("x".into()).is_session_rejection());
    }

    #[test]
    fn test_authentication_message_is_displayed_verbatim() {
        let err = Error::Authentication("Invalid email or password".into());
        assert_eq!(err.to_string(), "Invalid email or password");
    }
}
