//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "freespeek-admin.toml",
    "config.toml",
    "./config/freespeek-admin.toml",
    "./config/config.toml",
    "/etc/freespeek/admin.toml",
];

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        self.load_with(|key| env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with an explicit variable lookup
    pub fn load_with<F>(&self, lookup: F) -> Result<AppConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file(&lookup) {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        apply_overrides(&mut config, &lookup);
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file<F>(&self, lookup: &F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
            warn!(?path, "Configured file does not exist, falling back to search paths");
        }

        if let Some(path) = lookup("FREESPEEK_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_overrides<F>(config: &mut AppConfig, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    // API
    if let Some(val) = lookup("FREESPEEK_API_BASE_URL") {
        config.api.base_url = val.trim_end_matches('/').to_string();
    }
    set_parsed(lookup, "FREESPEEK_API_TIMEOUT_MS", &mut config.api.timeout_ms);
    set_parsed(lookup, "FREESPEEK_API_RETRY_ATTEMPTS", &mut config.api.retry_attempts);
    set_parsed(lookup, "FREESPEEK_API_RETRY_DELAY_MS", &mut config.api.retry_delay_ms);

    // Session
    if let Some(val) = lookup("FREESPEEK_TOKEN_DIR") {
        config.session.token_dir = val;
    }
    if let Some(val) = lookup("FREESPEEK_STORAGE_KEY") {
        config.session.storage_key = val;
    }

    // Polling
    set_parsed(lookup, "FREESPEEK_DASHBOARD_INTERVAL_MS", &mut config.polling.dashboard_interval_ms);
    set_parsed(lookup, "FREESPEEK_LIVE_USERS_INTERVAL_MS", &mut config.polling.live_users_interval_ms);
    set_parsed(lookup, "FREESPEEK_TRACKING_INTERVAL_MS", &mut config.polling.tracking_interval_ms);
    set_parsed(lookup, "FREESPEEK_USERS_INTERVAL_MS", &mut config.polling.users_interval_ms);
    set_parsed(lookup, "FREESPEEK_FETCH_TIMEOUT_MS", &mut config.polling.fetch_timeout_ms);
    set_parsed(lookup, "FREESPEEK_USERS_PAGE_SIZE", &mut config.polling.users_page_size);

    // Watcher
    if let Some(val) = lookup("FREESPEEK_ADMIN_EMAIL") {
        config.watch.email = val;
    }
    if let Some(val) = lookup("FREESPEEK_ADMIN_PASSWORD") {
        config.watch.password = val;
    }
    set_parsed(lookup, "FREESPEEK_LOGOUT_ON_EXIT", &mut config.watch.logout_on_exit);
}

/// Overwrite `target` when the variable is set and parses; bad values are
/// logged and ignored.
fn set_parsed<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(val) = lookup(key) {
        match val.trim().parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(key, value = %val, "Ignoring unparseable environment override"),
        }
    }
}
