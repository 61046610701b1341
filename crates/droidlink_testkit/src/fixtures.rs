//! Test fixtures: temporary stores, settings and recording collaborators.

use droidlink_store::{EventState, EventType, MemoryEventStore, NewEvent};
use droidlink_sync_engine::{
    DeviceRegistrar, FileSettingsStore, MemorySettingsStore, NewEventNotifier, Settings,
    SyncObserver, SyncRequest, SyncRequester, SyncResult,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// A file-backed event store in a temporary directory.
pub struct TestStore {
    /// The store.
    pub store: Arc<MemoryEventStore>,
    _temp_dir: TempDir,
}

impl TestStore {
    /// Opens a durable store in a fresh temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = MemoryEventStore::open(temp_dir.path()).expect("Failed to open event store");
        Self {
            store: Arc::new(store),
            _temp_dir: temp_dir,
        }
    }

    /// Returns the data directory.
    pub fn path(&self) -> &Path {
        self._temp_dir.path()
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestStore {
    type Target = MemoryEventStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// A settings file in a temporary directory.
pub struct TestSettings {
    /// The settings store.
    pub settings: Arc<FileSettingsStore>,
    _temp_dir: TempDir,
}

impl TestSettings {
    /// Creates an empty settings file location.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let settings = FileSettingsStore::new(temp_dir.path().join("settings.json"));
        Self {
            settings: Arc::new(settings),
            _temp_dir: temp_dir,
        }
    }
}

impl Default for TestSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory settings with an account and device selected.
pub fn configured_settings(account: &str, device_id: &str) -> Arc<MemorySettingsStore> {
    let mut settings = Settings {
        account: Some(account.to_string()),
        device_id: Some(device_id.to_string()),
        device_name: Some(format!("Device {device_id}")),
        ..Settings::default()
    };
    settings
        .account_device_ids
        .insert(account.to_string(), device_id.to_string());
    Arc::new(MemorySettingsStore::with_settings(settings))
}

/// Insert values for a local event with a fixed id.
pub fn local_event(id: &str, device_id: &str, event_type: EventType, state: EventState) -> NewEvent {
    NewEvent::new(device_id, event_type)
        .with_id(id)
        .with_state(state)
}

/// Counts registration requests.
#[derive(Debug, Default)]
pub struct CountingRegistrar {
    requests: AtomicUsize,
}

impl CountingRegistrar {
    /// Creates a registrar with no requests.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests received.
    pub fn count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl DeviceRegistrar for CountingRegistrar {
    fn request_registration(&self, _force: bool) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records new-event notifications as `(count, event_id)`.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<(usize, Option<String>)>>,
}

impl RecordingNotifier {
    /// Creates a notifier with no calls.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the calls received.
    pub fn calls(&self) -> Vec<(usize, Option<String>)> {
        self.calls.lock().clone()
    }
}

impl NewEventNotifier for RecordingNotifier {
    fn on_new_events(&self, count: usize, event_id: Option<&str>) {
        self.calls.lock().push((count, event_id.map(str::to_string)));
    }
}

/// Records running-state changes.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    changes: Mutex<Vec<bool>>,
}

impl RecordingObserver {
    /// Creates an observer with no changes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the changes received.
    pub fn changes(&self) -> Vec<bool> {
        self.changes.lock().clone()
    }
}

impl SyncObserver for RecordingObserver {
    fn on_sync_running(&self, running: bool) {
        self.changes.lock().push(running);
    }
}

/// Accepts and records sync requests without running them.
#[derive(Debug, Default)]
pub struct RecordingRequester {
    requests: Mutex<Vec<SyncRequest>>,
}

impl RecordingRequester {
    /// Creates a requester with no requests.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the requests received.
    pub fn requests(&self) -> Vec<SyncRequest> {
        self.requests.lock().clone()
    }
}

impl SyncRequester for RecordingRequester {
    fn request(&self, request: SyncRequest) -> SyncResult<()> {
        self.requests.lock().push(request);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use droidlink_store::EventStore;
    use droidlink_sync_engine::SettingsStore;

    #[test]
    fn test_store_is_durable() {
        let store = TestStore::new();
        assert!(store.is_durable());
        store
            .insert(local_event("E1", "d1", EventType::MissedCall, EventState::Uploaded))
            .unwrap();
        assert!(store.path().join("events.json").exists());
    }

    #[test]
    fn configured_settings_select_device() {
        let settings = configured_settings("me@example.com", "d1").load().unwrap();
        assert_eq!(settings.account.as_deref(), Some("me@example.com"));
        assert_eq!(settings.device_id.as_deref(), Some("d1"));
        assert_eq!(
            settings.account_device_ids.get("me@example.com").map(String::as_str),
            Some("d1")
        );
    }

    #[test]
    fn test_settings_start_empty() {
        let settings = TestSettings::new();
        assert_eq!(settings.settings.load().unwrap(), Settings::default());
    }
}
