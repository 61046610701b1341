//! Error types for event store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during event store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred while persisting or loading the store.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A required field was absent on insert.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// An event with the same identifier already exists.
    #[error("duplicate event id: {0}")]
    DuplicateId(String),

    /// An update or delete affected a different number of rows than expected.
    #[error("expected {expected} row(s) to be affected, got {actual}")]
    ExpectedCountMismatch {
        /// Expected number of affected rows.
        expected: usize,
        /// Actual number of affected rows.
        actual: usize,
    },

    /// An unknown integer code was found for an enumerated column.
    #[error("invalid {field} code: {code}")]
    InvalidCode {
        /// Column name.
        field: &'static str,
        /// The offending code.
        code: i32,
    },

    /// One operation in a batch failed; the whole batch was rolled back.
    #[error("batch operation {index} failed: {source}")]
    BatchFailed {
        /// Position of the failing operation within the batch.
        index: usize,
        /// The underlying failure.
        #[source]
        source: Box<StoreError>,
    },

    /// The snapshot file could not be decoded.
    #[error("store corrupted: {0}")]
    Corrupted(String),

    /// Another process holds the store lock.
    #[error("event store is locked by another process")]
    Locked,
}

impl StoreError {
    /// Wraps an error as the failure of the batch operation at `index`.
    pub fn batch_failed(index: usize, source: StoreError) -> Self {
        Self::BatchFailed {
            index,
            source: Box::new(source),
        }
    }

    /// Returns true if the failure came from the storage medium rather
    /// than from the operation itself.
    pub fn is_storage_failure(&self) -> bool {
        match self {
            StoreError::Io(_) | StoreError::Corrupted(_) | StoreError::Locked => true,
            StoreError::BatchFailed { source, .. } => source.is_storage_failure(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupted(err.to_string())
    }
}
