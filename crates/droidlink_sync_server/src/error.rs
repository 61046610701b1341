//! Failures answered by the reference server, each mapped to an HTTP status.

use thiserror::Error;

/// Result alias used throughout the server.
pub type ServerResult<T> = Result<T, ServerError>;

/// A request the server refused or could not serve.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Body or path could not be understood (400).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or rejected credential (401).
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// Unknown event or route, or a device the account never registered (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Known route, wrong verb (405).
    #[error("{method} is not supported on {path}")]
    MethodNotAllowed {
        /// Verb of the request.
        method: &'static str,
        /// Path of the request.
        path: String,
    },

    /// Body larger than [`ServerConfig::body_limit`](crate::ServerConfig) (413).
    #[error("body of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge {
        /// Received bytes.
        size: usize,
        /// Allowed bytes.
        limit: usize,
    },

    /// Scripted or unexpected failure (500).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Status code sent back for this failure.
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::NotAuthorized(_) => 401,
            Self::NotFound(_) => 404,
            Self::MethodNotAllowed { .. } => 405,
            Self::PayloadTooLarge { .. } => 413,
            Self::Internal(_) => 500,
        }
    }

    /// True for the 4xx family.
    pub fn is_client_error(&self) -> bool {
        matches!(self.status(), 400..=499)
    }

    /// True for the 5xx family, which devices treat as retryable.
    pub fn is_server_error(&self) -> bool {
        self.status() >= 500
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}
