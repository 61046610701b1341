//! Sync cycle states, requests and results.

use crate::error::GrantPermission;
use std::time::Duration;

/// Which steps a cycle runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStrategy {
    /// Push local deletes and uploads, download and merge the remote
    /// collection.
    Full,
    /// Push local deletes and uploads only.
    Light,
}

/// The step a sync cycle is executing.
///
/// ```text
/// IDLE → CHECKING_TOKEN → UPLOADING_DELETES → [DOWNLOADING_REMOTE → MERGING]
///      → UPLOADING_CREATES → FINALIZING → IDLE
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    /// No cycle running.
    Idle,
    /// Evaluating the token, account and debounce gates.
    CheckingToken,
    /// Pushing local deletions.
    UploadingDeletes,
    /// Fetching the remote collection (full cycles only).
    DownloadingRemote,
    /// Merging the remote collection into the store (full cycles only).
    Merging,
    /// Pushing locally created events.
    UploadingCreates,
    /// Refreshing the sync token and recording the sync time.
    Finalizing,
}

impl SyncState {
    /// Returns true if a cycle is running.
    pub fn is_active(&self) -> bool {
        !matches!(self, SyncState::Idle)
    }
}

/// A request to run one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// Account the request is about.
    pub account: String,
    /// Steps to run.
    pub strategy: SyncStrategy,
    /// Token carried by a push message, if any.
    pub sync_token: Option<String>,
}

impl SyncRequest {
    /// A full sync request for `account`.
    pub fn full(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            strategy: SyncStrategy::Full,
            sync_token: None,
        }
    }

    /// A light sync request for `account`.
    pub fn light(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            strategy: SyncStrategy::Light,
            sync_token: None,
        }
    }

    /// Attaches a sync token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.sync_token = Some(token.into());
        self
    }
}

/// Why a cycle stopped at the gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The request carried the token this device last issued or saw.
    TokenMatch,
    /// The request is about another account.
    AccountMismatch,
    /// A cycle finished less than the debounce interval ago.
    Debounced,
    /// No device identifier is configured.
    DeviceNotConfigured,
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every step ran.
    Completed,
    /// A gate stopped the cycle before any work.
    Skipped(SkipReason),
    /// A step failed; later steps did not run.
    Aborted {
        /// The failing step.
        step: SyncState,
        /// The error message.
        error: String,
    },
    /// The credential needs user consent; retry after it is granted.
    PermissionRequired(GrantPermission),
}

impl CycleOutcome {
    /// Returns true for [`CycleOutcome::Completed`].
    pub fn is_completed(&self) -> bool {
        matches!(self, CycleOutcome::Completed)
    }

    /// Returns true for [`CycleOutcome::Skipped`].
    pub fn is_skipped(&self) -> bool {
        matches!(self, CycleOutcome::Skipped(_))
    }
}

/// Result of a sync cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCycleResult {
    /// Strategy that ran.
    pub strategy: SyncStrategy,
    /// How the cycle ended.
    pub outcome: CycleOutcome,
    /// Events deleted on the server.
    pub deleted_remote: u64,
    /// Local rows removed (after remote deletes or removal on the server).
    pub deleted_local: u64,
    /// Remote events inserted locally.
    pub inserted: u64,
    /// Local rows refreshed from the server.
    pub updated: u64,
    /// Events uploaded.
    pub uploaded: u64,
    /// Malformed events skipped.
    pub skipped_entries: u64,
    /// Identifiers of the events inserted by the merge.
    pub new_event_ids: Vec<String>,
    /// Sync token generated by this cycle.
    pub sync_token: Option<String>,
    /// Whether device registration was requested.
    pub registration_requested: bool,
    /// Duration of the cycle.
    pub duration: Duration,
}

impl SyncCycleResult {
    pub(crate) fn new(strategy: SyncStrategy) -> Self {
        Self {
            strategy,
            outcome: CycleOutcome::Completed,
            deleted_remote: 0,
            deleted_local: 0,
            inserted: 0,
            updated: 0,
            uploaded: 0,
            skipped_entries: 0,
            new_event_ids: Vec::new(),
            sync_token: None,
            registration_requested: false,
            duration: Duration::ZERO,
        }
    }

    /// Total number of local row changes made by the cycle.
    pub fn local_changes(&self) -> u64 {
        self.deleted_local + self.inserted + self.updated + self.uploaded
    }
}

/// Cumulative statistics across cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Cycles that passed the gates.
    pub cycles_started: u64,
    /// Cycles that ran every step.
    pub cycles_completed: u64,
    /// Cycles stopped by a gate.
    pub cycles_skipped: u64,
    /// Cycles aborted by an error.
    pub cycles_aborted: u64,
    /// Rows inserted.
    pub num_inserts: u64,
    /// Rows updated (refreshes and upload confirmations).
    pub num_updates: u64,
    /// Rows deleted.
    pub num_deletes: u64,
    /// Entries skipped as malformed.
    pub num_skipped_entries: u64,
    /// Network, server and storage failures.
    pub num_io_exceptions: u64,
    /// Authentication failures and pending consents.
    pub num_auth_exceptions: u64,
    /// Message of the last failure.
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_checks() {
        assert!(!SyncState::Idle.is_active());
        assert!(SyncState::Merging.is_active());
        assert!(SyncState::Finalizing.is_active());
    }

    #[test]
    fn request_builders() {
        let request = SyncRequest::full("me").with_token("t");
        assert_eq!(request.strategy, SyncStrategy::Full);
        assert_eq!(request.sync_token.as_deref(), Some("t"));
        assert_eq!(SyncRequest::light("me").strategy, SyncStrategy::Light);
    }

    #[test]
    fn local_changes() {
        let mut result = SyncCycleResult::new(SyncStrategy::Full);
        result.inserted = 1;
        result.uploaded = 2;
        result.deleted_local = 1;
        assert_eq!(result.local_changes(), 4);
        assert!(result.outcome.is_completed());
    }
}
