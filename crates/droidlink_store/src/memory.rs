//! In-memory event store with optional durable snapshot.

use crate::batch::{BatchOperation, OperationResult};
use crate::change_feed::{ChangeEvent, ChangeFeed, ChangeType};
use crate::error::{StoreError, StoreResult};
use crate::event::{now_millis, Event};
use crate::filter::EventFilter;
use crate::snapshot::SnapshotFile;
use crate::store::EventStore;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;

/// An [`EventStore`] holding the table in memory.
///
/// Batches are applied in place under the write lock while an undo log
/// records the prior value of every touched row. A failing operation or a
/// failed snapshot write replays the log backwards, so readers never
/// observe a half-applied batch. Changes are published before the lock is
/// released and therefore reach subscribers in commit order.
///
/// # Example
///
/// ```rust
/// use droidlink_store::{EventStore, EventType, MemoryEventStore, NewEvent};
///
/// let store = MemoryEventStore::in_memory();
/// let event = store
///     .insert(NewEvent::new("device-1", EventType::MissedCall).with_number("555"))
///     .unwrap();
/// assert_eq!(store.get(&event.id).unwrap(), Some(event));
/// ```
pub struct MemoryEventStore {
    rows: RwLock<BTreeMap<String, Event>>,
    snapshot: Option<SnapshotFile>,
    feed: ChangeFeed,
    sequence: AtomicU64,
    injected_failure: Mutex<Option<usize>>,
}

impl MemoryEventStore {
    /// Creates an empty, non-durable store.
    pub fn in_memory() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            snapshot: None,
            feed: ChangeFeed::new(),
            sequence: AtomicU64::new(0),
            injected_failure: Mutex::new(None),
        }
    }

    /// Opens a durable store in `dir`, loading any existing snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`] if another process has the store open,
    /// or [`StoreError::Corrupted`] if the snapshot cannot be decoded.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        let snapshot = SnapshotFile::open(dir)?;
        let rows = snapshot
            .load()?
            .into_iter()
            .map(|event| (event.id.clone(), event))
            .collect::<BTreeMap<_, _>>();

        tracing::debug!(path = %snapshot.dir().display(), rows = rows.len(), "opened event store");

        Ok(Self {
            rows: RwLock::new(rows),
            snapshot: Some(snapshot),
            feed: ChangeFeed::new(),
            sequence: AtomicU64::new(0),
            injected_failure: Mutex::new(None),
        })
    }

    /// Returns true if commits are persisted to disk.
    pub fn is_durable(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Makes the next batch fail with a storage error when it reaches the
    /// operation at `index`. Used to exercise rollback.
    pub fn inject_batch_failure(&self, index: usize) {
        *self.injected_failure.lock() = Some(index);
    }

    fn apply_one(
        table: &mut BTreeMap<String, Event>,
        operation: BatchOperation,
        now: i64,
        undo: &mut UndoLog,
        changes: &mut Vec<(String, ChangeType)>,
    ) -> StoreResult<OperationResult> {
        match operation {
            BatchOperation::Insert(values) => {
                let event = values.into_event(now)?;
                if table.contains_key(&event.id) {
                    return Err(StoreError::DuplicateId(event.id));
                }
                let id = event.id.clone();
                table.insert(id.clone(), event);
                undo.push((id.clone(), None));
                changes.push((id.clone(), ChangeType::Insert));
                Ok(OperationResult::Inserted(id))
            }
            BatchOperation::Update {
                filter,
                patch,
                expected_count,
            } => {
                let ids = matching_ids(table, &filter);
                check_expected(expected_count, ids.len())?;
                for id in &ids {
                    if let Some(event) = table.get_mut(id) {
                        undo.push((id.clone(), Some(event.clone())));
                        patch.apply(event);
                    }
                    changes.push((id.clone(), ChangeType::Update));
                }
                Ok(OperationResult::Updated(ids.len()))
            }
            BatchOperation::Delete {
                filter,
                expected_count,
            } => {
                let ids = matching_ids(table, &filter);
                check_expected(expected_count, ids.len())?;
                for id in &ids {
                    if let Some(previous) = table.remove(id) {
                        undo.push((id.clone(), Some(previous)));
                    }
                    changes.push((id.clone(), ChangeType::Delete));
                }
                Ok(OperationResult::Deleted(ids.len()))
            }
        }
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl EventStore for MemoryEventStore {
    fn query(&self, filter: &EventFilter) -> StoreResult<Vec<Event>> {
        let rows = self.rows.read();
        let mut events: Vec<Event> = match &filter.id {
            Some(id) => rows
                .get(id)
                .filter(|e| filter.matches(e))
                .cloned()
                .into_iter()
                .collect(),
            None => rows.values().filter(|e| filter.matches(e)).cloned().collect(),
        };
        events.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| a.id.cmp(&b.id)));
        Ok(events)
    }

    fn apply_batch(&self, operations: Vec<BatchOperation>) -> StoreResult<Vec<OperationResult>> {
        if operations.is_empty() {
            return Ok(Vec::new());
        }

        let fail_at = self.injected_failure.lock().take();
        let now = now_millis();

        let mut rows = self.rows.write();
        let mut undo = UndoLog::new();
        let mut results = Vec::with_capacity(operations.len());
        let mut changes = Vec::new();

        for (index, operation) in operations.into_iter().enumerate() {
            if fail_at == Some(index) {
                tracing::warn!(index, "injected storage failure");
                roll_back(&mut rows, undo);
                return Err(StoreError::batch_failed(
                    index,
                    StoreError::Io(io::Error::other("injected storage failure")),
                ));
            }
            let kind = operation.kind();
            match Self::apply_one(&mut rows, operation, now, &mut undo, &mut changes) {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::debug!(index, kind, error = %e, "batch rolled back");
                    roll_back(&mut rows, undo);
                    return Err(StoreError::batch_failed(index, e));
                }
            }
        }

        if let Some(snapshot) = &self.snapshot {
            if let Err(e) = snapshot.write(rows.values()) {
                roll_back(&mut rows, undo);
                return Err(e);
            }
        }

        let events = changes
            .into_iter()
            .map(|(id, change_type)| {
                let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
                ChangeEvent::new(sequence, id, change_type)
            })
            .collect();
        self.feed.emit_batch(events);
        drop(rows);

        Ok(results)
    }

    fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.feed.subscribe()
    }
}

/// Prior value of each row touched by a batch; `None` for inserted rows.
type UndoLog = Vec<(String, Option<Event>)>;

fn roll_back(table: &mut BTreeMap<String, Event>, undo: UndoLog) {
    for (id, previous) in undo.into_iter().rev() {
        match previous {
            Some(event) => {
                table.insert(id, event);
            }
            None => {
                table.remove(&id);
            }
        }
    }
}

fn matching_ids(table: &BTreeMap<String, Event>, filter: &EventFilter) -> Vec<String> {
    match &filter.id {
        Some(id) => table
            .get(id)
            .filter(|e| filter.matches(e))
            .map(|e| vec![e.id.clone()])
            .unwrap_or_default(),
        None => table
            .values()
            .filter(|e| filter.matches(e))
            .map(|e| e.id.clone())
            .collect(),
    }
}

fn check_expected(expected: Option<usize>, actual: usize) -> StoreResult<()> {
    match expected {
        Some(expected) if expected != actual => {
            Err(StoreError::ExpectedCountMismatch { expected, actual })
        }
        _ => Ok(()),
    }
}
