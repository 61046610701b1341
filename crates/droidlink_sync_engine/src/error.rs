//! Failures of the remote client, the reconciliation cycle and its collaborators.

use droidlink_store::StoreError;
use thiserror::Error;

/// Result alias for engine, client and settings calls.
pub type SyncResult<T> = Result<T, SyncError>;

/// A pending user consent required before the account credential can be
/// issued.
///
/// The user-facing layer shows `prompt`, obtains consent, and triggers a
/// new sync; nothing is retried automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantPermission {
    /// Account waiting for consent.
    pub account: String,
    /// What to show the user.
    pub prompt: String,
}

impl GrantPermission {
    /// Creates a consent request for `account`.
    pub fn new(account: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            prompt: prompt.into(),
        }
    }
}

/// Why a request, a cycle step or a collaborator failed.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The server answered 404.
    #[error("resource not found ({status}): {url}")]
    NotFound {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The server answered 500.
    #[error("server failure: {url}")]
    ServerFailure {
        /// Requested URL.
        url: String,
    },

    /// The server answered another non-success status.
    #[error("request failed with status {status}: {url}")]
    RequestFailed {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// A successful response carried a body that is not valid JSON.
    #[error("invalid JSON from {url}: {message}")]
    InvalidJson {
        /// Requested URL.
        url: String,
        /// Parser message.
        message: String,
    },

    /// Connecting to the server timed out.
    #[error("connect timeout: {url}")]
    ConnectTimeout {
        /// Requested URL.
        url: String,
    },

    /// The request never got an HTTP answer.
    #[error("network failure: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether a later cycle may succeed.
        retryable: bool,
    },

    /// User consent is required before the request can be authenticated.
    #[error("permission required for account {}", .0.account)]
    PermissionRequired(GrantPermission),

    /// The account credential could not be obtained.
    #[error("cannot authenticate account: {0}")]
    AuthenticationFailed(String),

    /// Local event store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A local value could not be encoded for the wire.
    #[error("cannot encode event: {0}")]
    Protocol(String),

    /// Settings could not be loaded or saved.
    #[error("settings error: {0}")]
    Settings(String),

    /// A required setting is missing.
    #[error("not configured: {0}")]
    NotConfigured(&'static str),

    /// The trigger queue is full; the request was dropped.
    #[error("sync queue full")]
    QueueFull,

    /// The background worker has stopped.
    #[error("sync worker stopped")]
    Stopped,
}

impl SyncError {
    /// A network failure worth retrying in a later cycle.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// A network failure that will not heal by itself.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if a later sync cycle may succeed without user action.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::ConnectTimeout { .. }
            | SyncError::ServerFailure { .. }
            | SyncError::NotFound { .. }
            | SyncError::QueueFull => true,
            _ => false,
        }
    }

    /// Returns true for a 404 answer.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound { .. })
    }

    /// Returns true for authentication failures and pending consent.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            SyncError::AuthenticationFailed(_) | SyncError::PermissionRequired(_)
        )
    }

    /// Returns the HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::NotFound { status, .. } | SyncError::RequestFailed { status, .. } => {
                Some(*status)
            }
            SyncError::ServerFailure { .. } => Some(500),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(!SyncError::transport_fatal("invalid certificate").is_retryable());
        assert!(SyncError::ConnectTimeout { url: "u".into() }.is_retryable());
        assert!(!SyncError::AuthenticationFailed("denied".into()).is_retryable());
    }

    #[test]
    fn classification() {
        let not_found = SyncError::NotFound {
            url: "https://h/api/1/events/E1".into(),
            status: 404,
        };
        assert!(not_found.is_not_found());
        assert_eq!(not_found.status(), Some(404));
        assert_eq!(SyncError::ServerFailure { url: "u".into() }.status(), Some(500));

        let pending = SyncError::PermissionRequired(GrantPermission::new("me@example.com", "allow"));
        assert!(pending.is_auth());
        assert!(pending.to_string().contains("me@example.com"));
    }
}
