//! Account credentials attached to every request.

use crate::error::{GrantPermission, SyncError, SyncResult};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Supplies the bearer credential of an account.
///
/// How the credential is obtained (OAuth, device account manager, a
/// static secret) is outside the engine. An implementation that needs
/// user consent first returns [`SyncError::PermissionRequired`].
pub trait AuthProvider: Send + Sync {
    /// Returns the credential to send as `Authorization: Bearer ...`.
    fn credential(&self, account: &str) -> SyncResult<String>;
}

/// Credentials configured up front, per account.
#[derive(Debug, Default)]
pub struct StaticToken {
    tokens: RwLock<HashMap<String, String>>,
}

impl StaticToken {
    /// Creates a provider without credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider holding one credential.
    pub fn single(account: impl Into<String>, token: impl Into<String>) -> Self {
        let provider = Self::new();
        provider.set(account, token);
        provider
    }

    /// Sets the credential of `account`.
    pub fn set(&self, account: impl Into<String>, token: impl Into<String>) {
        self.tokens.write().insert(account.into(), token.into());
    }
}

impl AuthProvider for StaticToken {
    fn credential(&self, account: &str) -> SyncResult<String> {
        self.tokens.read().get(account).cloned().ok_or_else(|| {
            SyncError::PermissionRequired(GrantPermission::new(
                account,
                format!("Allow DroidLink to access the account {account}"),
            ))
        })
    }
}
