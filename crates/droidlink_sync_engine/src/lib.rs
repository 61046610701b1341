//! # DroidLink Sync Engine
//!
//! Reconciliation of the local event store with the DroidLink server.
//!
//! This crate provides:
//! - Remote sync client over a pluggable HTTP client
//! - Transport abstraction (REST and mock)
//! - Reconciliation engine and its per-cycle state machine
//! - Sync trigger: a bounded single-worker request queue
//! - Device identity and registration
//! - Settings store, new-event notifier, event capture and purge
//!
//! ## Architecture
//!
//! A cycle pushes local changes around a download of the remote collection:
//! 1. Push local deletions, so deleted events are not downloaded again
//! 2. Download and merge the remote collection (full cycles only)
//! 3. Push local creations, which the merge never touches
//! 4. Broadcast a new sync token so other devices skip the echo
//!
//! ## Key Invariants
//!
//! - At most one cycle runs at a time
//! - Only rows already `UPLOADED` are refreshed or removed by the merge
//! - Each merge is applied as one atomic batch
//! - A failed step aborts the cycle; applied batches stay committed
//! - Errors never escape a cycle; they are counted in [`SyncStats`]

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod capture;
mod client;
mod config;
mod engine;
mod error;
mod http;
mod notifier;
mod registration;
mod settings;
mod state;
mod transport;
mod trigger;

pub use auth::{AuthProvider, StaticToken};
pub use capture::{EventPurger, EventRecorder};
pub use client::RemoteClient;
pub use config::{RetryConfig, SyncConfig, DEFAULT_API_VERSION, DEFAULT_HOST, DEFAULT_USER_AGENT};
pub use engine::{SyncEngine, SyncRunner};
pub use error::{GrantPermission, SyncError, SyncResult};
#[cfg(feature = "http-client")]
pub use http::ReqwestClient;
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, LoopbackClient, LoopbackServer};
pub use notifier::{NewEventNotifier, NoopNotifier, Notification, SyncObserver, UnreadCounterNotifier};
pub use registration::{
    BackgroundRegistrar, DeviceIdentity, DeviceRegistrar, NoopRegistrar, RegistrationService,
    DEFAULT_DEVICE_NAME,
};
pub use settings::{FileSettingsStore, MemorySettingsStore, Settings, SettingsEditor, SettingsStore};
pub use state::{
    CycleOutcome, SkipReason, SyncCycleResult, SyncRequest, SyncState, SyncStats, SyncStrategy,
};
pub use transport::{HttpTransport, MockFailure, MockTransport, SyncTransport, TransportCall};
pub use trigger::{SyncRequester, SyncTrigger};
