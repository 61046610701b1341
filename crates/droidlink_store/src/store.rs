//! The event store contract.

use crate::batch::{BatchOperation, OperationResult};
use crate::change_feed::ChangeEvent;
use crate::error::{StoreError, StoreResult};
use crate::event::{Event, NewEvent};
use crate::filter::{EventFilter, EventPatch};
use std::sync::mpsc::Receiver;

/// Local durable table of events.
///
/// All mutations go through [`apply_batch`](Self::apply_batch), which is
/// atomic: either every operation of the batch is committed or none is.
/// The single-row helpers are one-operation batches, so callers never need
/// to read-modify-write outside the store.
///
/// Implementations must be safe to share between the sync worker and
/// capture handlers running on other threads.
pub trait EventStore: Send + Sync {
    /// Returns rows matching `filter`, newest first.
    fn query(&self, filter: &EventFilter) -> StoreResult<Vec<Event>>;

    /// Applies `operations` as one atomic unit.
    ///
    /// On failure nothing from the batch is observable and the error is
    /// [`StoreError::BatchFailed`] naming the failing operation.
    fn apply_batch(&self, operations: Vec<BatchOperation>) -> StoreResult<Vec<OperationResult>>;

    /// Subscribes to committed changes.
    fn subscribe(&self) -> Receiver<ChangeEvent>;

    /// Returns the row with `id`, if any.
    fn get(&self, id: &str) -> StoreResult<Option<Event>> {
        Ok(self.query(&EventFilter::by_id(id))?.into_iter().next())
    }

    /// Counts rows matching `filter`.
    fn count(&self, filter: &EventFilter) -> StoreResult<usize> {
        Ok(self.query(filter)?.len())
    }

    /// Inserts a row, filling in defaults, and returns it.
    fn insert(&self, values: NewEvent) -> StoreResult<Event> {
        let results = self
            .apply_batch(vec![BatchOperation::insert(values)])
            .map_err(unwrap_single)?;
        let id = match results.into_iter().next() {
            Some(OperationResult::Inserted(id)) => id,
            other => {
                return Err(StoreError::Corrupted(format!(
                    "unexpected insert result: {other:?}"
                )))
            }
        };
        self.get(&id)?
            .ok_or_else(|| StoreError::Corrupted(format!("inserted event {id} not found")))
    }

    /// Updates rows matching `filter` and returns how many changed.
    fn update(&self, filter: &EventFilter, patch: &EventPatch) -> StoreResult<usize> {
        let results = self
            .apply_batch(vec![BatchOperation::update(filter.clone(), patch.clone())])
            .map_err(unwrap_single)?;
        Ok(results.first().map(OperationResult::affected).unwrap_or(0))
    }

    /// Removes rows matching `filter` and returns how many were removed.
    fn delete(&self, filter: &EventFilter) -> StoreResult<usize> {
        let results = self
            .apply_batch(vec![BatchOperation::delete(filter.clone())])
            .map_err(unwrap_single)?;
        Ok(results.first().map(OperationResult::affected).unwrap_or(0))
    }
}

/// Single-operation helpers report the underlying failure directly.
fn unwrap_single(err: StoreError) -> StoreError {
    match err {
        StoreError::BatchFailed { source, .. } => *source,
        other => other,
    }
}
