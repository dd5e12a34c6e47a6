//! Client configuration

use std::time::Duration;

/// Upper bound on attempts per request
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Configuration for the admin API client
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL for the admin API
    pub base_url: String,

    /// Request timeout
    pub timeout: Duration,

    /// Maximum attempts for retryable failures
    pub retry_attempts: u32,

    /// Initial retry delay, doubled on each attempt
    pub retry_delay: Duration,

    /// User agent string
    pub user_agent: String,
}

impl Config {
    /// Create a new configuration with the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(15),
            retry_attempts: 2,
            retry_delay: Duration::from_millis(200),
            user_agent: format!("Freespeek-Admin/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set retry configuration
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts.clamp(1, MAX_RETRY_ATTEMPTS);
        self.retry_delay = delay;
        self
    }

    /// Set custom user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Delay before retry number `attempt` (1-based), doubling each time
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.retry_delay.saturating_mul(factor)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("http://localhost:5000")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let config = Config::new("https://api.freespeek.app/");
        assert_eq!(config.url("/api/auth/me"), "https://api.freespeek.app/api/auth/me");
    }

    #[test]
    fn test_retry_attempts_floor() {
        let config = Config::default().with_retry(0, Duration::from_millis(10));
        assert_eq!(config.retry_attempts, 1);

        let config = Config::default().with_retry(u32::MAX, Duration::from_millis(10));
        assert_eq!(config.retry_attempts, MAX_RETRY_ATTEMPTS);
    }

    #[test]
    fn test_backoff_doubles_and_saturates() {
        let config = Config::default().with_retry(3, Duration::from_millis(100));
        assert_eq!(config.backoff(1), Duration::from_millis(100));
        assert_eq!(config.backoff(3), Duration::from_millis(400));

        let config = Config::default().with_retry(3, Duration::from_secs(u64::MAX / 2));
        assert_eq!(config.backoff(40), Duration::MAX);
    }
}
