//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors decoding or encoding wire messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The JSON could not be encoded or decoded.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The message decoded but violates the protocol.
    #[error("invalid {kind}: {message}")]
    Invalid {
        /// Message kind.
        kind: &'static str,
        /// What was wrong.
        message: String,
    },
}

impl ProtocolError {
    /// Creates an invalid event error.
    pub fn invalid_event(message: impl Into<String>) -> Self {
        Self::Invalid {
            kind: "event",
            message: message.into(),
        }
    }
}
