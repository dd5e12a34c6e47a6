//! # Freespeek Admin Console Core
//!
//! Session lifecycle and data refresh for the Freespeek admin console.
//!
//! ## Features
//!
//! - **Session Manager**: restores, creates and tears down the bearer-token
//!   session, and publishes its status on a `watch` channel
//! - **API Client**: bearer-token HTTP client with retries and a rejection
//!   signal on 401
//! - **Polling Data Controller**: fetch on mount / interval / demand, with
//!   coalescing and stale-result discard
//! - **Pages and Routes**: per-page resource bundles and the route guard
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use freespeek_admin::{ApiClient, Config, FileTokenStore, SessionManager};
//! use freespeek_admin::pages::{DashboardPage, PageSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::new(Config::new("http://localhost:5000"))?;
//!     let store = Arc::new(FileTokenStore::new("./data", "freespeek_admin_token"));
//!     let session = Arc::new(SessionManager::new(Arc::new(client.clone()), store));
//!     session.spawn_rejection_listener(client.subscribe_rejections());
//!
//!     if !session.initialize().await.is_authenticated() {
//!         session.login("admin@freespeek.app", "secret").await?;
//!     }
//!
//!     let dashboard = DashboardPage::mount(&client, &PageSettings::default(), session.subscribe());
//!     dashboard.stats.refresh().await;
//!     println!("{:?}", dashboard.stats.data());
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod client;
pub mod config;
pub mod error;
pub mod login;
pub mod models;
pub mod pages;
pub mod polling;
pub mod routes;
pub mod session;
pub mod storage;
pub mod token;

// Re-export main types
pub use client::ApiClient;
pub use config::Config;
pub use error::{Error, Result};
pub use login::{extract_credentials, Credentials, ExtractionError, LoginResponse};
pub use models::User;
pub use polling::{FetchOutcome, PendingFetch, PollHandle, PollingResource, ResourceState};
pub use routes::{Navigation, Route};
pub use session::{AuthBackend, SessionManager, SessionStatus};
pub use storage::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use token::{SessionToken, TokenError};
