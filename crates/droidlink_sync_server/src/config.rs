//! Reference server settings.

use std::time::Duration;

/// Lifetime of a signed credential unless overridden.
pub const DEFAULT_CREDENTIAL_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Largest event or registration body accepted unless overridden.
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

/// How the reference server treats incoming requests.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HMAC key for signed credentials. Without one the bearer value is
    /// taken as the account name.
    pub credential_secret: Option<Vec<u8>>,
    /// How long a signed credential stays valid.
    pub credential_ttl: Duration,
    /// Largest accepted request body, in bytes.
    pub body_limit: usize,
}

impl ServerConfig {
    /// Open server: any bearer value names the account.
    pub fn new() -> Self {
        Self {
            credential_secret: None,
            credential_ttl: DEFAULT_CREDENTIAL_TTL,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Requires credentials signed with `secret`.
    pub fn with_auth(mut self, secret: Vec<u8>) -> Self {
        self.credential_secret = Some(secret);
        self
    }

    pub fn with_credential_ttl(mut self, ttl: Duration) -> Self {
        self.credential_ttl = ttl;
        self
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// True when requests must carry a signed credential.
    pub fn requires_auth(&self) -> bool {
        self.credential_secret.is_some()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_by_default() {
        let config = ServerConfig::default();
        assert!(!config.requires_auth());
        assert_eq!(config.body_limit, DEFAULT_BODY_LIMIT);
        assert_eq!(config.credential_ttl, DEFAULT_CREDENTIAL_TTL);
    }

    #[test]
    fn secret_enables_auth() {
        let config = ServerConfig::new()
            .with_body_limit(128)
            .with_credential_ttl(Duration::from_secs(60))
            .with_auth(b"k".to_vec());

        assert!(config.requires_auth());
        assert_eq!(config.body_limit, 128);
        assert_eq!(config.credential_ttl, Duration::from_secs(60));
    }
}
