//! Admin API client
//!
//! Thin HTTP layer: builds requests, attaches the bearer token when one is
//! set, maps statuses to [`Error`] and retries retryable failures. Whoever
//! owns the session decides which token is attached; the client never
//! inspects it.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::login::LoginResponse;
use crate::models::{User, UserEnvelope};
use crate::session::AuthBackend;

const LOGIN_PATH: &str = "/api/auth/login";
const LOGOUT_PATH: &str = "/api/auth/logout";
const CURRENT_USER_PATH: &str = "/api/auth/me";

/// Admin API client
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: Arc<Config>,
    http_client: reqwest::Client,
    token: Arc<RwLock<Option<String>>>,
    rejections: broadcast::Sender<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Error body the backend sends alongside 4xx/5xx statuses
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiClient {
    /// Create a new client with the given configuration
    pub fn new(config: Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let (rejections, _) = broadcast::channel(16);

        Ok(Self {
            config: Arc::new(config),
            http_client,
            token: Arc::new(RwLock::new(None)),
            rejections,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Attach a bearer token to every subsequent request
    pub fn set_auth_token(&self, token: &str) {
        *self.token.write() = Some(token.to_string());
    }

    /// Stop sending a bearer token
    pub fn clear_auth_token(&self) {
        *self.token.write() = None;
    }

    pub fn has_auth_token(&self) -> bool {
        self.token.read().is_some()
    }

    /// Fires whenever the backend answers 401 to a request that carried a
    /// token, with the token that was rejected. The session manager listens
    /// to this.
    pub fn subscribe_rejections(&self) -> broadcast::Receiver<String> {
        self.rejections.subscribe()
    }

    /// GET `path` with query parameters, decoding the JSON body
    pub async fn get<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let (builder, bearer) = self.request(Method::GET, path);
        let request = builder.query(query).build()?;
        self.execute(request, bearer).await
    }

    /// POST a JSON body to `path`, decoding the JSON response
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (builder, bearer) = self.request(Method::POST, path);
        let request = builder.json(body).build()?;
        self.execute(request, bearer).await
    }

    /// Request builder for `path`, with the bearer token if one is set
    fn request(&self, method: Method, path: &str) -> (reqwest::RequestBuilder, Option<String>) {
        let builder = self.http_client.request(method, self.config.url(path));
        match self.token.read().clone() {
            Some(token) => (builder.bearer_auth(&token), Some(token)),
            None => (builder, None),
        }
    }

    /// Execute a request with retries and status mapping
    async fn execute<T>(&self, request: reqwest::Request, bearer: Option<String>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let mut last_error = None;

        for attempt in 0..self.config.retry_attempts.max(1) {
            if attempt > 0 {
                tokio::time::sleep(self.config.backoff(attempt)).await;
            }

            let request = request
                .try_clone()
                .ok_or_else(|| Error::Other("Request cannot be cloned".into()))?;
            let url = request.url().path().to_string();

            match self.http_client.execute(request).await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let bytes = response.bytes().await?;
                        let body: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
                        return Ok(serde_json::from_slice(body)?);
                    }

                    let message = error_message(response.text().await.unwrap_or_default(), status);

                    if status == StatusCode::UNAUTHORIZED {
                        if let Some(token) = &bearer {
                            warn!(path = %url, "Backend rejected the session token");
                            // No receivers is fine: nobody owns a session yet.
                            let _ = self.rejections.send(token.clone());
                        }
                    }

                    let error = Error::from_status(status, message);
                    if !error.is_retryable() {
                        return Err(error);
                    }
                    debug!(path = %url, attempt, status = status.as_u16(), "Retryable response");
                    last_error = Some(error);
                }
                Err(e) if e.is_timeout() => {
                    debug!(path = %url, attempt, "Request timed out");
                    last_error = Some(Error::Timeout(self.config.timeout));
                }
                Err(e) => {
                    debug!(path = %url, attempt, error = %e, "Request failed");
                    last_error = Some(Error::Http(e));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Other("Request failed".into())))
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        // Credentials travel alone; a stale token must not ride along.
        let request = self
            .http_client
            .post(self.config.url(LOGIN_PATH))
            .json(&LoginRequest { email, password })
            .build()?;

        let response = self.http_client.execute(request).await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(self.config.timeout)
            } else {
                Error::Http(e)
            }
        })?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status.is_success() {
            return Ok(serde_json::from_str(&text)?);
        }

        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::UNPROCESSABLE_ENTITY => {
                let message = parse_error_body(&text).unwrap_or_else(|| "Invalid email or password".to_string());
                Err(Error::Authentication(message))
            }
            _ => Err(Error::from_status(status, error_message(text, status))),
        }
    }

    async fn logout(&self) -> Result<()> {
        let _: serde_json::Value = self.post(LOGOUT_PATH, &serde_json::json!({})).await?;
        Ok(())
    }

    async fn get_current_user(&self) -> Result<User> {
        let envelope: UserEnvelope = self.get(CURRENT_USER_PATH, &[]).await?;
        envelope
            .into_record()
            .resolve(None)
            .ok_or_else(|| Error::Other("Current user response carries no identity".into()))
    }

    fn set_auth_token(&self, token: &str) {
        ApiClient::set_auth_token(self, token);
    }

    fn clear_auth_token(&self) {
        ApiClient::clear_auth_token(self);
    }
}

fn parse_error_body(text: &str) -> Option<String> {
    let body: ErrorBody = serde_json::from_str(text).ok()?;
    body.message
        .or(body.error)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}

fn error_message(text: String, status: StatusCode) -> String {
    if let Some(message) = parse_error_body(&text) {
        return message;
    }
    let text = text.trim();
    if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_json_message() {
        assert_eq!(
            error_message(r#"{"success":false,"message":"Token expired"}"#.into(), StatusCode::UNAUTHORIZED),
            "Token expired"
        );
        assert_eq!(
            error_message(r#"{"error":"boom"}"#.into(), StatusCode::INTERNAL_SERVER_ERROR),
            "boom"
        );
        assert_eq!(error_message("plain text".into(), StatusCode::BAD_GATEWAY), "plain text");
        assert_eq!(error_message(String::new(), StatusCode::NOT_FOUND), "Not Found");
    }

    #[test]
    fn test_token_slot() {
        let client = ApiClient::new(Config::default()).unwrap();
        assert!(!client.has_auth_token());
        client.set_auth_token("abc");
        assert!(client.has_auth_token());
        client.clear_auth_token();
        assert!(!client.has_auth_token());
    }
}
