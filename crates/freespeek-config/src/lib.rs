//! Freespeek Admin Configuration
//!
//! TOML-based configuration with `FREESPEEK_*` environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Highest `api.retry_attempts` accepted
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub polling: PollingConfig,
    pub watch: WatchConfig,
}

/// Backend REST API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the admin API, without a trailing slash
    pub base_url: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// Attempts for retryable failures (429 / 5xx)
    pub retry_attempts: u32,
    /// Initial delay between retries in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_ms: 15_000,
            retry_attempts: 2,
            retry_delay_ms: 200,
        }
    }
}

/// Token persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding the persisted token file
    pub token_dir: String,
    /// Storage key; also the token file name
    pub storage_key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_dir: "./data".to_string(),
            storage_key: "freespeek_admin_token".to_string(),
        }
    }
}

/// Refresh cadence of the data pages. An interval of 0 disables auto-refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub dashboard_interval_ms: u64,
    pub live_users_interval_ms: u64,
    pub tracking_interval_ms: u64,
    pub users_interval_ms: u64,
    /// Upper bound for a single fetch, including retries
    pub fetch_timeout_ms: u64,
    pub users_page_size: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            dashboard_interval_ms: 5_000,
            live_users_interval_ms: 10_000,
            tracking_interval_ms: 30_000,
            users_interval_ms: 0,
            fetch_timeout_ms: 15_000,
            users_page_size: 20,
        }
    }
}

/// Settings for the headless watcher binary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Email used when no valid persisted session exists
    pub email: String,
    /// Password for `email`; prefer FREESPEEK_ADMIN_PASSWORD over the file
    pub password: String,
    /// Log out (and drop the persisted token) on shutdown
    pub logout_on_exit: bool,
}

impl WatchConfig {
    pub fn has_credentials(&self) -> bool {
        !self.email.is_empty() && !self.password.is_empty()
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration with environment variable override
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    /// Reject settings the console cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.api.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::ValidationError("api.base_url must not be empty".into()));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                base_url
            )));
        }
        if self.api.timeout_ms == 0 {
            return Err(ConfigError::ValidationError("api.timeout_ms must be greater than 0".into()));
        }
        if self.api.retry_attempts > MAX_RETRY_ATTEMPTS {
            return Err(ConfigError::ValidationError(format!(
                "api.retry_attempts must be at most {}, got {}",
                MAX_RETRY_ATTEMPTS, self.api.retry_attempts
            )));
        }
        if self.polling.fetch_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "polling.fetch_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.session.storage_key.trim().is_empty() {
            return Err(ConfigError::ValidationError("session.storage_key must not be empty".into()));
        }
        Ok(())
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# Freespeek Admin Console Configuration
# Environment variables (FREESPEEK_*) override these settings

[api]
base_url = "http://localhost:5000"
timeout_ms = 15000
retry_attempts = 2
retry_delay_ms = 200

[session]
token_dir = "./data"
storage_key = "freespeek_admin_token"

[polling]
dashboard_interval_ms = 5000
live_users_interval_ms = 10000
tracking_interval_ms = 30000
users_interval_ms = 0     # 0 disables auto-refresh
fetch_timeout_ms = 15000
users_page_size = 20

[watch]
email = ""
password = ""             # prefer FREESPEEK_ADMIN_PASSWORD
logout_on_exit = false
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_toml_parses_to_defaults() {
        let config = AppConfig::from_toml_str(&AppConfig::example_toml()).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:5000");
        assert_eq!(config.polling.dashboard_interval_ms, 5_000);
        assert_eq!(config.session.storage_key, "freespeek_admin_token");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AppConfig::from_toml_str("[api]\nbase_url = \"https://admin.freespeek.app\"\n").unwrap();
        assert_eq!(config.api.base_url, "https://admin.freespeek.app");
        assert_eq!(config.api.timeout_ms, 15_000);
        assert_eq!(config.polling.users_page_size, 20);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.api.base_url = " ".into();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = AppConfig::default();
        config.api.base_url = "ftp://example.com".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.api.timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.api.retry_attempts = 64;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_watch_credentials() {
        let mut watch = WatchConfig::default();
        assert!(!watch.has_credentials());
        watch.email = "admin@freespeek.app".into();
        watch.password = "secret".into();
        assert!(watch.has_credentials());
    }
}
