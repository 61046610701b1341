//! Signed account credentials.
//!
//! A credential names the account it was issued for and when; the server
//! recomputes the HMAC-SHA256 signature and rejects stale tokens.
//!
//! ## Token Format
//!
//! ```text
//! {account}:{timestamp}:{signature}
//! ```
//!
//! `timestamp` is Unix millis in decimal; `signature` is the lowercase hex
//! HMAC-SHA256 of `{account}:{timestamp}`. Tokens travel as
//! `Authorization: Bearer {token}`.

use crate::config::DEFAULT_CREDENTIAL_TTL;
use crate::error::{ServerError, ServerResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Key and lifetime of signed credentials.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC key.
    pub secret: Vec<u8>,
    /// Age after which a credential is rejected.
    pub max_age: Duration,
}

impl AuthConfig {
    /// Credentials signed with `secret`, valid for a day.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            max_age: DEFAULT_CREDENTIAL_TTL,
        }
    }

    pub fn with_expiry(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }
}

/// Issues and checks account tokens.
#[derive(Clone)]
pub struct TokenValidator {
    config: AuthConfig,
}

impl TokenValidator {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Creates a token for `account`, valid from now.
    pub fn create_token(&self, account: &str) -> ServerResult<String> {
        self.create_token_at(account, now_millis())
    }

    fn create_token_at(&self, account: &str, timestamp: u64) -> ServerResult<String> {
        if account.is_empty() || account.contains(':') {
            return Err(ServerError::InvalidRequest(format!(
                "account cannot be used in a token: {account:?}"
            )));
        }
        let claims = format!("{account}:{timestamp}");
        let signature = self.mac(&claims)?.finalize().into_bytes();
        Ok(format!("{claims}:{}", to_hex(&signature)))
    }

    /// Validates a token and returns the account it was issued for.
    pub fn validate_token(&self, token: &str) -> ServerResult<String> {
        let mut parts = token.rsplitn(3, ':');
        let (Some(signature), Some(timestamp), Some(account)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(ServerError::NotAuthorized("malformed token".into()));
        };

        let signature = from_hex(signature)
            .ok_or_else(|| ServerError::NotAuthorized("malformed signature".into()))?;
        self.mac(&format!("{account}:{timestamp}"))?
            .verify_slice(&signature)
            .map_err(|_| ServerError::NotAuthorized("invalid signature".into()))?;

        let timestamp: u64 = timestamp
            .parse()
            .map_err(|_| ServerError::NotAuthorized("malformed timestamp".into()))?;
        let expiry_millis = u64::try_from(self.config.max_age.as_millis()).unwrap_or(u64::MAX);
        if now_millis() > timestamp.saturating_add(expiry_millis) {
            return Err(ServerError::NotAuthorized("token expired".into()));
        }

        Ok(account.to_string())
    }

    fn mac(&self, claims: &str) -> ServerResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.config.secret)
            .map_err(|e| ServerError::Internal(format!("invalid HMAC key: {e}")))?;
        mac.update(claims.as_bytes());
        Ok(mac)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn from_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| text.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> TokenValidator {
        TokenValidator::new(AuthConfig::new(b"test-secret-key-32-bytes-long!!".to_vec()))
    }

    #[test]
    fn create_and_validate_token() {
        let validator = validator();
        let token = validator.create_token("me@example.com").unwrap();
        assert!(token.starts_with("me@example.com:"));
        assert_eq!(validator.validate_token(&token).unwrap(), "me@example.com");
    }

    #[test]
    fn reject_other_secret() {
        let token = validator().create_token("me@example.com").unwrap();
        let other = TokenValidator::new(AuthConfig::new(b"another-secret".to_vec()));
        assert!(other.validate_token(&token).is_err());
    }

    #[test]
    fn reject_tampered_token() {
        let validator = validator();
        let token = validator.create_token("me@example.com").unwrap();
        let forged = token.replacen("me@example.com", "you@example.com", 1);
        assert!(validator.validate_token(&forged).is_err());

        let mut truncated = token.clone();
        truncated.pop();
        assert!(validator.validate_token(&truncated).is_err());
        assert!(validator.validate_token("garbage").is_err());
    }

    #[test]
    fn reject_expired_token() {
        let validator = TokenValidator::new(
            AuthConfig::new(b"test-secret-key-32-bytes-long!!".to_vec())
                .with_expiry(Duration::from_secs(60)),
        );
        let token = validator
            .create_token_at("me@example.com", now_millis() - 120_000)
            .unwrap();
        assert!(matches!(
            validator.validate_token(&token),
            Err(ServerError::NotAuthorized(_))
        ));
    }

    #[test]
    fn reject_unusable_account() {
        assert!(validator().create_token("a:b").is_err());
        assert!(validator().create_token("").is_err());
    }

    #[test]
    fn hex_round_trip() {
        assert_eq!(to_hex(&[0x00, 0xab, 0x7f]), "00ab7f");
        assert_eq!(from_hex("00ab7f"), Some(vec![0x00, 0xab, 0x7f]));
        assert_eq!(from_hex("0g"), None);
        assert_eq!(from_hex("abc"), None);
    }
}
