//! Notifications of committed store mutations.
//!
//! A commit produces one [`ChangeEvent`] per affected row, delivered after
//! the commit and in commit order. List views subscribe to refresh; late
//! readers can catch up from the retained backlog with [`ChangeFeed::since`].
//!
//! ```rust,ignore
//! let store = MemoryEventStore::in_memory();
//! let changes = store.subscribe();
//!
//! std::thread::spawn(move || {
//!     for change in changes {
//!         println!("{:?} {}", change.change_type, change.event_id);
//!     }
//! });
//! ```

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};

/// Changes kept for [`ChangeFeed::since`] by default.
const DEFAULT_BACKLOG: usize = 1024;

/// What happened to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// Row inserted.
    Insert,
    /// Row updated.
    Update,
    /// Row removed.
    Delete,
}

/// One row affected by a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Position in the store's commit order, starting at 1.
    pub sequence: u64,
    /// Identifier of the affected event.
    pub event_id: String,
    /// What happened to the row.
    pub change_type: ChangeType,
}

impl ChangeEvent {
    /// Creates a change event.
    pub fn new(sequence: u64, event_id: impl Into<String>, change_type: ChangeType) -> Self {
        Self {
            sequence,
            event_id: event_id.into(),
            change_type,
        }
    }
}

#[derive(Default)]
struct FeedState {
    subscribers: Vec<Sender<ChangeEvent>>,
    backlog: VecDeque<ChangeEvent>,
}

/// Fan-out of committed changes with a bounded backlog.
///
/// Subscribers whose receiver was dropped are forgotten on the next
/// publish.
pub struct ChangeFeed {
    state: Mutex<FeedState>,
    capacity: usize,
}

impl ChangeFeed {
    /// Creates a feed with the default backlog.
    pub fn new() -> Self {
        Self::with_backlog(DEFAULT_BACKLOG)
    }

    /// Creates a feed retaining the last `capacity` changes.
    pub fn with_backlog(capacity: usize) -> Self {
        Self {
            state: Mutex::new(FeedState::default()),
            capacity,
        }
    }

    /// Receives every change published from now on.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.state.lock().subscribers.push(tx);
        rx
    }

    /// Publishes the changes of one commit.
    ///
    /// The feed lock is held for the whole commit, so two commits never
    /// interleave at a subscriber.
    pub fn emit_batch(&self, events: Vec<ChangeEvent>) {
        if events.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        state
            .subscribers
            .retain(|tx| events.iter().all(|event| tx.send(event.clone()).is_ok()));

        state.backlog.extend(events);
        let excess = state.backlog.len().saturating_sub(self.capacity);
        state.backlog.drain(..excess);
    }

    /// Returns up to `limit` retained changes after sequence `cursor`.
    pub fn since(&self, cursor: u64, limit: usize) -> Vec<ChangeEvent> {
        self.state
            .lock()
            .backlog
            .iter()
            .skip_while(|event| event.sequence <= cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Sequence of the last published change, or 0.
    pub fn last_sequence(&self) -> u64 {
        self.state
            .lock()
            .backlog
            .back()
            .map_or(0, |event| event.sequence)
    }

    /// Number of subscribers still connected at the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
