//! # DroidLink Store
//!
//! Local event table for DroidLink.
//!
//! This crate provides:
//! - The [`Event`] model and its lifecycle states
//! - The [`EventStore`] contract: query, insert, update, delete
//! - Atomic mixed batches ([`BatchOperation`])
//! - A change feed for observers of committed mutations
//! - [`MemoryEventStore`], optionally persisted to a snapshot file
//!
//! ## Key Invariants
//!
//! - Optional text columns are never stored as empty strings
//! - Inserts without a state start at `PENDING_UPLOAD`
//! - A batch commits all of its operations or none of them
//! - Change notifications are emitted only after commit, in commit order

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod change_feed;
mod error;
mod event;
mod filter;
mod memory;
mod snapshot;
mod store;

pub use batch::{BatchOperation, OperationResult};
pub use change_feed::{ChangeEvent, ChangeFeed, ChangeType};
pub use error::{StoreError, StoreResult};
pub use event::{now_millis, trim_to_null, Event, EventState, EventType, NewEvent};
pub use filter::{EventFilter, EventPatch};
pub use memory::MemoryEventStore;
pub use store::EventStore;
