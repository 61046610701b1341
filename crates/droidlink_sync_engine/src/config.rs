//! Configuration for the sync engine.

use droidlink_sync_protocol::paths;
use std::time::Duration;

/// Default server host.
pub const DEFAULT_HOST: &str = "mydroidlink.appspot.com";

/// Default REST API version.
pub const DEFAULT_API_VERSION: u32 = 1;

/// Default `User-Agent` header.
pub const DEFAULT_USER_AGENT: &str = "Droid Link";

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Server host.
    pub host: String,
    /// REST API version.
    pub api_version: u32,
    /// Overrides the `https://{host}/api/{version}` base URL.
    pub base_url_override: Option<String>,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
    /// Minimum interval between two sync cycles.
    pub debounce: Duration,
    /// Read timeout of one request.
    pub timeout: Duration,
    /// Connect timeout of one request.
    pub connect_timeout: Duration,
    /// Retry policy for event uploads.
    pub retry: RetryConfig,
    /// Number of sync requests that may wait behind the running one.
    pub queue_capacity: usize,
    /// Age after which a purge marks events for deletion.
    pub event_max_age: Duration,
}

impl SyncConfig {
    /// Creates a configuration for `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            api_version: DEFAULT_API_VERSION,
            base_url_override: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            debounce: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
            queue_capacity: 2,
            event_max_age: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }

    /// Returns the REST API base URL.
    pub fn base_url(&self) -> String {
        match &self.base_url_override {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => paths::base_url(&self.host, self.api_version),
        }
    }

    /// Sets the API version.
    #[must_use]
    pub fn with_api_version(mut self, version: u32) -> Self {
        self.api_version = version;
        self
    }

    /// Uses `url` as the API base instead of the host-derived one.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url_override = Some(url.into());
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the debounce interval.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the upload retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the trigger queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the purge age.
    #[must_use]
    pub fn with_event_max_age(mut self, age: Duration) -> Self {
        self.event_max_age = age;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST)
    }
}

/// Retry policy for a single request.
///
/// Only connect timeouts are retried; every other failure is reported at
/// once and left to the next sync cycle.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl RetryConfig {
    /// Creates a policy with `max_attempts` attempts.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Duration::ZERO,
        }
    }

    /// A single attempt.
    pub fn no_retry() -> Self {
        Self::new(1)
    }

    /// Sets the pause between attempts.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.base_url(), "https://mydroidlink.appspot.com/api/1");
        assert_eq!(config.user_agent, "Droid Link");
        assert_eq!(config.debounce, Duration::from_secs(1));
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn builder() {
        let config = SyncConfig::new("sync.example.com")
            .with_api_version(2)
            .with_debounce(Duration::ZERO)
            .with_queue_capacity(4)
            .with_retry(RetryConfig::no_retry());

        assert_eq!(config.base_url(), "https://sync.example.com/api/2");
        assert_eq!(config.debounce, Duration::ZERO);
        assert_eq!(config.queue_capacity, 4);
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn base_url_override() {
        let config = SyncConfig::default().with_base_url("http://127.0.0.1:8080/api/1/");
        assert_eq!(config.base_url(), "http://127.0.0.1:8080/api/1");
    }

    #[test]
    fn retry_needs_one_attempt() {
        assert_eq!(RetryConfig::new(0).max_attempts, 1);
    }
}
