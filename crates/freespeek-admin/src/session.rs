//! Session Manager
//!
//! Owns the bearer token for the lifetime of the console:
//! - `initialize`: restore a persisted token once at startup
//! - `login` / `logout`: explicit transitions
//! - `invalidate`: silent teardown on expiry or backend rejection
//!
//! Status is published on a `watch` channel. Route guards must treat
//! `is_loading` as "not decided yet" rather than "signed out".
//!
//! Every install or removal of a token happens under the generation lock and
//! bumps the generation. Startup restoration and backend rejections only
//! act while the generation (or token) they were started against is still
//! the current one.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch, Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::login::{extract_credentials, LoginResponse};
use crate::models::User;
use crate::storage::TokenStore;
use crate::token::SessionToken;

/// The slice of the API the session lifecycle needs
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange credentials. Rejected credentials surface as
    /// [`Error::Authentication`].
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse>;

    /// Tell the backend the session is over
    async fn logout(&self) -> Result<()>;

    /// Profile of the user the attached token belongs to
    async fn get_current_user(&self) -> Result<User>;

    fn set_auth_token(&self, token: &str);

    fn clear_auth_token(&self);
}

/// Observable authentication state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub user: Option<User>,
    pub is_loading: bool,
}

impl SessionStatus {
    pub fn loading() -> Self {
        Self { user: None, is_loading: true }
    }

    pub fn signed_out() -> Self {
        Self { user: None, is_loading: false }
    }

    pub fn signed_in(user: User) -> Self {
        Self { user: Some(user), is_loading: false }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

pub struct SessionManager {
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn TokenStore>,
    token: Mutex<Option<SessionToken>>,
    generation: AsyncMutex<u64>,
    status: watch::Sender<SessionStatus>,
    initialized: OnceCell<()>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn AuthBackend>, store: Arc<dyn TokenStore>) -> Self {
        let (status, _) = watch::channel(SessionStatus::loading());
        Self {
            backend,
            store,
            token: Mutex::new(None),
            generation: AsyncMutex::new(0),
            status,
            initialized: OnceCell::new(),
        }
    }

    /// Snapshot of the current status
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status.borrow().is_authenticated()
    }

    /// Expiry of the token currently in use
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.token.lock().as_ref().map(SessionToken::expires_at)
    }

    /// Restore the persisted session. Runs once; later and concurrent calls
    /// wait for that run and return the resulting status.
    pub async fn initialize(&self) -> SessionStatus {
        self.initialized.get_or_init(|| self.restore()).await;
        self.status()
    }

    /// Wait until startup restoration has settled
    pub async fn ready(&self) -> SessionStatus {
        let mut rx = self.subscribe();
        let status = match rx.wait_for(|status| !status.is_loading).await {
            Ok(status) => status.clone(),
            Err(_) => self.status(),
        };
        status
    }

    async fn restore(&self) {
        let started = *self.generation.lock().await;

        let raw = match self.store.load().await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Could not read persisted token");
                None
            }
        };

        let Some(raw) = raw else {
            debug!("No persisted session");
            let generation = self.generation.lock().await;
            if *generation == started {
                self.publish(SessionStatus::signed_out());
            }
            return;
        };

        let token = match SessionToken::validate(&raw) {
            Ok(token) => token,
            Err(e) => {
                info!(reason = %e, "Discarding persisted token");
                self.clear_since(started).await;
                return;
            }
        };

        let installed = {
            let mut generation = self.generation.lock().await;
            if *generation != started {
                debug!("Session changed during restore, keeping it");
                return;
            }
            self.install(&mut generation, token)
        };

        match self.backend.get_current_user().await {
            Ok(user) => {
                let generation = self.generation.lock().await;
                if *generation == installed {
                    info!(user_id = %user.id, "Session restored");
                    self.publish(SessionStatus::signed_in(user));
                }
            }
            Err(e) => {
                warn!(error = %e, "Persisted session could not be confirmed, signing out");
                self.clear_since(installed).await;
            }
        }
    }

    /// Exchange credentials for a session.
    ///
    /// Every failure comes back as [`Error::Authentication`] with a message
    /// fit for the login form; status stays signed out.
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(Error::Authentication("Email and password are required".into()));
        }

        let response = match self.backend.login(email, password).await {
            Ok(response) => response,
            Err(Error::Authentication(message)) => {
                info!(email, "Login rejected");
                return Err(Error::Authentication(message));
            }
            Err(e) => {
                warn!(email, error = %e, "Login request failed");
                return Err(Error::Authentication(
                    "Unable to sign in right now, please try again".into(),
                ));
            }
        };

        let credentials = extract_credentials(&response, email).map_err(|e| {
            warn!(email, error = %e, "Login response had no usable credentials");
            Error::from(e)
        })?;

        let token = SessionToken::validate(&credentials.token).map_err(|e| {
            warn!(email, error = %e, "Login returned an unusable token");
            Error::Authentication("Login failed: the server returned an invalid session token".into())
        })?;

        let mut generation = self.generation.lock().await;
        if let Err(e) = self.store.save(token.as_str()).await {
            warn!(error = %e, "Could not persist token, session will not survive a restart");
        }
        self.install(&mut generation, token);

        // A later initialize() must not re-read storage over this session.
        let _ = self.initialized.set(());

        info!(user_id = %credentials.user.id, "Logged in");
        self.publish(SessionStatus::signed_in(credentials.user.clone()));
        Ok(credentials.user)
    }

    /// End the session. The backend is told on a best-effort basis; local
    /// state is cleared regardless.
    pub async fn logout(&self) {
        let had_token = self.token.lock().is_some();
        if had_token {
            if let Err(e) = self.backend.logout().await {
                warn!(error = %e, "Backend logout failed, clearing local session anyway");
            }
        }
        let mut generation = self.generation.lock().await;
        self.clear_locked(&mut generation).await;
        info!("Logged out");
    }

    /// Drop the session without contacting the backend. Used for expiry and
    /// rejection; never surfaces an error.
    pub async fn invalidate(&self, reason: &str) {
        let mut generation = self.generation.lock().await;
        let active = self.token.lock().is_some() || self.status.borrow().is_authenticated();
        if active {
            info!(reason, "Session invalidated");
        }
        self.clear_locked(&mut generation).await;
    }

    /// Invalidate only if `rejected` is the token currently in use. A late
    /// 401 for a token that has since been replaced is ignored.
    pub async fn reject(&self, rejected: &str) {
        let mut generation = self.generation.lock().await;
        let current = self
            .token
            .lock()
            .as_ref()
            .is_some_and(|token| token.as_str() == rejected);
        if !current {
            debug!("Ignoring rejection of a token no longer in use");
            return;
        }
        info!(reason = "rejected by backend", "Session invalidated");
        self.clear_locked(&mut generation).await;
    }

    /// Re-check the in-memory token; invalidates and returns false once it
    /// has expired.
    pub async fn ensure_valid(&self) -> bool {
        let valid = self.token.lock().as_ref().map(SessionToken::is_valid);
        match valid {
            Some(true) => true,
            Some(false) => {
                self.invalidate("token expired").await;
                false
            }
            None => false,
        }
    }

    /// [`reject`](Self::reject) every token the API client reports a 401
    /// for. The task ends when the manager is dropped or the channel closes.
    pub fn spawn_rejection_listener(
        self: &Arc<Self>,
        mut rejections: broadcast::Receiver<String>,
    ) -> JoinHandle<()> {
        let manager: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                match rejections.recv().await {
                    Ok(token) => {
                        let Some(manager) = manager.upgrade() else { break };
                        manager.reject(&token).await;
                    }
                    // The next request with a rejected token reports it again.
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Rejection listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn install(&self, generation: &mut AsyncMutexGuard<'_, u64>, token: SessionToken) -> u64 {
        self.backend.set_auth_token(token.as_str());
        *self.token.lock() = Some(token);
        **generation += 1;
        **generation
    }

    /// Clear unless another transition happened since `expected`
    async fn clear_since(&self, expected: u64) {
        let mut generation = self.generation.lock().await;
        if *generation != expected {
            debug!("Session changed during restore, keeping it");
            return;
        }
        self.clear_locked(&mut generation).await;
    }

    async fn clear_locked(&self, generation: &mut AsyncMutexGuard<'_, u64>) {
        *self.token.lock() = None;
        self.backend.clear_auth_token();
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Could not remove persisted token");
        }
        **generation += 1;
        self.publish(SessionStatus::signed_out());
    }

    fn publish(&self, status: SessionStatus) {
        self.status.send_replace(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_constructors() {
        assert!(SessionStatus::loading().is_loading);
        assert!(!SessionStatus::signed_out().is_authenticated());

        let status = SessionStatus::signed_in(User::from_email("a@b.com"));
        assert!(status.is_authenticated());
        assert!(!status.is_loading);
    }
}
