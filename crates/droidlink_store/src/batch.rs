//! Batched store operations.

use crate::event::NewEvent;
use crate::filter::{EventFilter, EventPatch};

/// One operation of an atomic batch.
///
/// A batch passed to [`EventStore::apply_batch`](crate::EventStore::apply_batch)
/// commits every operation or none of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Insert a new row.
    Insert(NewEvent),
    /// Update every row matching `filter`.
    Update {
        /// Rows to update.
        filter: EventFilter,
        /// Columns to change.
        patch: EventPatch,
        /// If set, the batch fails unless exactly this many rows match.
        expected_count: Option<usize>,
    },
    /// Remove every row matching `filter`.
    Delete {
        /// Rows to remove.
        filter: EventFilter,
        /// If set, the batch fails unless exactly this many rows match.
        expected_count: Option<usize>,
    },
}

impl BatchOperation {
    /// Inserts a row.
    pub fn insert(values: NewEvent) -> Self {
        BatchOperation::Insert(values)
    }

    /// Updates the row with `id`, requiring that it exists.
    pub fn update_by_id(id: impl Into<String>, patch: EventPatch) -> Self {
        BatchOperation::Update {
            filter: EventFilter::by_id(id),
            patch,
            expected_count: Some(1),
        }
    }

    /// Updates every row matching `filter`.
    pub fn update(filter: EventFilter, patch: EventPatch) -> Self {
        BatchOperation::Update {
            filter,
            patch,
            expected_count: None,
        }
    }

    /// Removes the row with `id` if present.
    pub fn delete_by_id(id: impl Into<String>) -> Self {
        BatchOperation::Delete {
            filter: EventFilter::by_id(id),
            expected_count: None,
        }
    }

    /// Removes every row matching `filter`.
    pub fn delete(filter: EventFilter) -> Self {
        BatchOperation::Delete {
            filter,
            expected_count: None,
        }
    }

    /// Requires the operation to affect exactly `count` rows.
    ///
    /// Has no effect on inserts.
    #[must_use]
    pub fn with_expected_count(mut self, count: usize) -> Self {
        match &mut self {
            BatchOperation::Insert(_) => {}
            BatchOperation::Update { expected_count, .. }
            | BatchOperation::Delete { expected_count, .. } => *expected_count = Some(count),
        }
        self
    }

    /// Short name of the operation, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            BatchOperation::Insert(_) => "insert",
            BatchOperation::Update { .. } => "update",
            BatchOperation::Delete { .. } => "delete",
        }
    }
}

/// Outcome of one committed batch operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// The row was inserted under this identifier.
    Inserted(String),
    /// Number of rows updated.
    Updated(usize),
    /// Number of rows removed.
    Deleted(usize),
}

impl OperationResult {
    /// Number of rows the operation touched.
    pub fn affected(&self) -> usize {
        match self {
            OperationResult::Inserted(_) => 1,
            OperationResult::Updated(n) | OperationResult::Deleted(n) => *n,
        }
    }
}
