//! The reconciliation engine: one sync cycle per request.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::notifier::{NewEventNotifier, NoopNotifier, SyncObserver};
use crate::registration::{DeviceRegistrar, NoopRegistrar};
use crate::settings::{Settings, SettingsEditor, SettingsStore};
use crate::state::{
    CycleOutcome, SkipReason, SyncCycleResult, SyncRequest, SyncState, SyncStats, SyncStrategy,
};
use crate::transport::SyncTransport;
use droidlink_store::{
    now_millis, BatchOperation, Event, EventFilter, EventPatch, EventState, EventStore,
    OperationResult,
};
use droidlink_sync_protocol::{EventPayload, SyncTokenMessage};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Runs sync cycles. Implemented by [`SyncEngine`]; the trigger only needs
/// this.
pub trait SyncRunner: Send + Sync {
    /// Runs one cycle for `request`. Never fails: the outcome and every
    /// error are reported in the result.
    fn run(&self, request: &SyncRequest) -> SyncCycleResult;
}

/// Local changes waiting to be pushed.
struct LocalDeltas {
    to_upload: Vec<(String, Value)>,
    to_delete: Vec<String>,
}

/// Reconciles the local event store with the server.
///
/// A cycle runs the steps below in order. A failing step aborts the rest of
/// the cycle; batches already applied stay committed.
///
/// ```text
/// CHECKING_TOKEN     token, account and debounce gates
/// UPLOADING_DELETES  DELETE /events/{id} for PENDING_DELETE rows
/// DOWNLOADING_REMOTE GET /events                      (full only)
/// MERGING            one batch refreshing UPLOADED rows (full only)
/// UPLOADING_CREATES  PUT /events/{id} for PENDING_UPLOAD rows
/// FINALIZING         new sync token, last sync time
/// ```
pub struct SyncEngine<T: SyncTransport, S: EventStore> {
    config: SyncConfig,
    transport: Arc<T>,
    store: Arc<S>,
    settings: Arc<dyn SettingsStore>,
    registrar: Arc<dyn DeviceRegistrar>,
    notifier: Arc<dyn NewEventNotifier>,
    observer: Option<Arc<dyn SyncObserver>>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    cycle: Mutex<()>,
}

impl<T: SyncTransport, S: EventStore> SyncEngine<T, S> {
    /// Creates an engine with no registrar, notifier or observer.
    pub fn new(
        config: SyncConfig,
        transport: Arc<T>,
        store: Arc<S>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            config,
            transport,
            store,
            settings,
            registrar: Arc::new(NoopRegistrar),
            notifier: Arc::new(NoopNotifier),
            observer: None,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            cycle: Mutex::new(()),
        }
    }

    /// Sets the collaborator asked to re-register the device on 404.
    #[must_use]
    pub fn with_registrar(mut self, registrar: Arc<dyn DeviceRegistrar>) -> Self {
        self.registrar = registrar;
        self
    }

    /// Sets the collaborator told about downloaded events.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn NewEventNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Sets the observer of running cycles.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Gets the event store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Gets the transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    fn enter(&self, state: SyncState) {
        tracing::debug!(?state, "sync state");
        *self.state.write() = state;
    }

    /// Runs one cycle for `request`.
    pub fn sync(&self, request: &SyncRequest) -> SyncCycleResult {
        let _cycle = self.cycle.lock();
        let start = Instant::now();
        let mut result = SyncCycleResult::new(request.strategy);

        self.enter(SyncState::CheckingToken);
        let settings = match self.settings.load() {
            Ok(settings) => settings,
            Err(e) => {
                self.record_failure(SyncState::CheckingToken, e, &mut result);
                return self.finish(result, start);
            }
        };

        if let Some(reason) = self.check_gates(request, &settings) {
            return self.skip(reason, result, start);
        }
        let Some(device_id) = settings.device_id.clone() else {
            tracing::warn!(account = %request.account, "no device identifier, sync skipped");
            self.stats.write().num_auth_exceptions += 1;
            return self.skip(SkipReason::DeviceNotConfigured, result, start);
        };

        tracing::info!(
            account = %request.account,
            strategy = ?request.strategy,
            "sync started"
        );
        self.stats.write().cycles_started += 1;
        if let Some(observer) = &self.observer {
            observer.on_sync_running(true);
        }

        if let Err(e) = self.run_steps(request.strategy, &device_id, &mut result) {
            let step = self.state();
            self.record_failure(step, e, &mut result);
        }

        // Recorded on every path past the gates so the debounce stays accurate.
        if let Err(e) = self.record_last_sync() {
            tracing::warn!(error = %e, "failed to record sync time");
            let mut stats = self.stats.write();
            stats.num_io_exceptions += 1;
            stats.last_error = Some(e.to_string());
        }

        if let Some(observer) = &self.observer {
            observer.on_sync_running(false);
        }
        self.finish(result, start)
    }

    fn check_gates(&self, request: &SyncRequest, settings: &Settings) -> Option<SkipReason> {
        if let Some(token) = &request.sync_token {
            if settings.sync_token.as_deref() == Some(token.as_str()) {
                tracing::info!(token = %token, "sync token already seen, sync skipped");
                return Some(SkipReason::TokenMatch);
            }
        }

        if settings.account.as_deref() != Some(request.account.as_str()) {
            tracing::warn!(account = %request.account, "sync requested for another account");
            return Some(SkipReason::AccountMismatch);
        }

        let elapsed = now_millis().saturating_sub(settings.last_sync);
        let debounce = i64::try_from(self.config.debounce.as_millis()).unwrap_or(i64::MAX);
        if (0..debounce).contains(&elapsed) {
            tracing::info!(elapsed_ms = elapsed, "last sync too recent, sync skipped");
            return Some(SkipReason::Debounced);
        }
        None
    }

    fn run_steps(
        &self,
        strategy: SyncStrategy,
        device_id: &str,
        result: &mut SyncCycleResult,
    ) -> SyncResult<()> {
        let deltas = self.collect_deltas(device_id, result)?;
        tracing::debug!(
            uploads = deltas.to_upload.len(),
            deletes = deltas.to_delete.len(),
            "local changes collected"
        );

        self.enter(SyncState::UploadingDeletes);
        self.push_deletes(&deltas.to_delete, result)?;

        if strategy == SyncStrategy::Full {
            self.enter(SyncState::DownloadingRemote);
            let remote = self.transport.fetch_events()?;
            self.enter(SyncState::Merging);
            self.merge(remote, result)?;
        }

        self.enter(SyncState::UploadingCreates);
        self.push_uploads(&deltas.to_upload, result)?;

        self.enter(SyncState::Finalizing);
        if result.deleted_remote > 0 || result.uploaded > 0 {
            self.refresh_token(device_id, result)?;
        }
        Ok(())
    }

    fn collect_deltas(&self, device_id: &str, result: &mut SyncCycleResult) -> SyncResult<LocalDeltas> {
        let filter = EventFilter::in_states(&[EventState::PendingUpload, EventState::PendingDelete])
            .with_device(device_id);

        let mut deltas = LocalDeltas {
            to_upload: Vec::new(),
            to_delete: Vec::new(),
        };
        for event in self.store.query(&filter)? {
            if event.state == EventState::PendingDelete {
                deltas.to_delete.push(event.id);
                continue;
            }
            match EventPayload::from(&event).to_value() {
                Ok(body) => deltas.to_upload.push((event.id, body)),
                Err(e) => {
                    tracing::warn!(event_id = %event.id, error = %e, "event not serializable, skipped");
                    result.skipped_entries += 1;
                }
            }
        }
        Ok(deltas)
    }

    fn push_deletes(&self, ids: &[String], result: &mut SyncCycleResult) -> SyncResult<()> {
        let mut staged = Vec::new();
        let mut failure = None;
        for id in ids {
            match self.transport.delete_event(id) {
                Ok(()) => {
                    tracing::debug!(event_id = %id, "event deleted remotely");
                    result.deleted_remote += 1;
                    staged.push(BatchOperation::delete_by_id(id.clone()));
                }
                Err(e) => {
                    tracing::warn!(event_id = %id, error = %e, "remote delete failed");
                    failure = Some(e);
                    break;
                }
            }
        }

        for applied in self.apply(staged)? {
            result.deleted_local += applied.affected() as u64;
        }
        failure.map_or(Ok(()), Err)
    }

    fn merge(&self, remote: Vec<Value>, result: &mut SyncCycleResult) -> SyncResult<()> {
        let mut synced: HashMap<String, Event> = HashMap::new();
        let mut unsynced: HashSet<String> = HashSet::new();
        for event in self.store.query(&EventFilter::all())? {
            if event.state == EventState::Uploaded {
                synced.insert(event.id.clone(), event);
            } else {
                unsynced.insert(event.id);
            }
        }

        let mut seen = HashSet::new();
        let mut operations = Vec::new();
        let mut new_ids = Vec::new();
        for value in remote {
            let payload = match EventPayload::from_value(value) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(error = %e, "malformed remote event skipped");
                    result.skipped_entries += 1;
                    continue;
                }
            };
            if !seen.insert(payload.id.clone()) {
                tracing::warn!(event_id = %payload.id, "duplicate remote event skipped");
                result.skipped_entries += 1;
                continue;
            }

            if let Some(local) = synced.remove(&payload.id) {
                if local.number != payload.number
                    || local.name != payload.name
                    || local.message != payload.message
                {
                    tracing::debug!(event_id = %payload.id, "refreshing event");
                    operations.push(BatchOperation::update_by_id(
                        payload.id.clone(),
                        EventPatch::content(
                            payload.number.as_deref(),
                            payload.name.as_deref(),
                            payload.message.as_deref(),
                        ),
                    ));
                }
            } else if unsynced.contains(&payload.id) {
                // Local changes to this event have not been pushed yet.
                tracing::debug!(event_id = %payload.id, "event pending locally, not merged");
            } else {
                tracing::debug!(event_id = %payload.id, "inserting remote event");
                new_ids.push(payload.id.clone());
                operations.push(BatchOperation::insert(payload.into_new_event()));
            }
        }

        for id in synced.into_keys() {
            tracing::debug!(event_id = %id, "event removed remotely");
            operations.push(BatchOperation::delete_by_id(id));
        }

        for applied in self.apply(operations)? {
            match applied {
                OperationResult::Inserted(_) => result.inserted += 1,
                OperationResult::Updated(n) => result.updated += n as u64,
                OperationResult::Deleted(n) => result.deleted_local += n as u64,
            }
        }

        if !new_ids.is_empty() {
            let single = if new_ids.len() == 1 {
                new_ids.first().map(String::as_str)
            } else {
                None
            };
            self.notifier.on_new_events(new_ids.len(), single);
        }
        result.new_event_ids = new_ids;
        Ok(())
    }

    fn push_uploads(&self, uploads: &[(String, Value)], result: &mut SyncCycleResult) -> SyncResult<()> {
        let mut staged = Vec::new();
        let mut failure = None;
        for (id, body) in uploads {
            match self.transport.upload_event(id, body) {
                Ok(()) => {
                    tracing::debug!(event_id = %id, "event uploaded");
                    result.uploaded += 1;
                    // Rows marked for deletion meanwhile keep that state.
                    staged.push(BatchOperation::update(
                        EventFilter::by_id(id.clone()).with_states(&[EventState::PendingUpload]),
                        EventPatch::state(EventState::Uploaded),
                    ));
                }
                Err(e) => {
                    tracing::warn!(event_id = %id, error = %e, "upload failed");
                    if e.is_not_found() {
                        self.request_registration(result);
                    }
                    failure = Some(e);
                    break;
                }
            }
        }

        let confirmed: usize = self.apply(staged)?.iter().map(OperationResult::affected).sum();
        self.stats.write().num_updates += confirmed as u64;
        failure.map_or(Ok(()), Err)
    }

    fn refresh_token(&self, device_id: &str, result: &mut SyncCycleResult) -> SyncResult<()> {
        let message = SyncTokenMessage::generate();
        {
            let mut editor = SettingsEditor::begin(self.settings.as_ref())?;
            editor.sync_token = Some(message.token.clone());
            editor.commit()?;
        }
        result.sync_token = Some(message.token.clone());

        match self.transport.broadcast_sync_token(device_id, &message) {
            Ok(()) => {
                tracing::debug!(token = %message.token, "sync token broadcast");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(device_id, "device unknown to the server");
                self.request_registration(result);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn request_registration(&self, result: &mut SyncCycleResult) {
        if !result.registration_requested {
            result.registration_requested = true;
            self.registrar.request_registration(true);
        }
    }

    fn apply(&self, operations: Vec<BatchOperation>) -> SyncResult<Vec<OperationResult>> {
        if operations.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.apply_batch(operations)?)
    }

    fn record_last_sync(&self) -> SyncResult<()> {
        let mut editor = SettingsEditor::begin(self.settings.as_ref())?;
        editor.last_sync = now_millis();
        editor.commit()
    }

    fn record_failure(&self, step: SyncState, error: SyncError, result: &mut SyncCycleResult) {
        let message = error.to_string();
        let mut stats = self.stats.write();
        if error.is_auth() {
            stats.num_auth_exceptions += 1;
        } else {
            stats.num_io_exceptions += 1;
        }
        stats.last_error = Some(message.clone());

        result.outcome = match error {
            SyncError::PermissionRequired(grant) => {
                tracing::warn!(account = %grant.account, "sync needs user permission");
                CycleOutcome::PermissionRequired(grant)
            }
            _ => {
                tracing::error!(?step, error = %message, "sync aborted");
                stats.cycles_aborted += 1;
                CycleOutcome::Aborted {
                    step,
                    error: message,
                }
            }
        };
    }

    fn skip(&self, reason: SkipReason, mut result: SyncCycleResult, start: Instant) -> SyncCycleResult {
        self.stats.write().cycles_skipped += 1;
        result.outcome = CycleOutcome::Skipped(reason);
        self.finish(result, start)
    }

    fn finish(&self, mut result: SyncCycleResult, start: Instant) -> SyncCycleResult {
        result.duration = start.elapsed();
        {
            let mut stats = self.stats.write();
            stats.num_inserts += result.inserted;
            stats.num_updates += result.updated;
            stats.num_deletes += result.deleted_local;
            stats.num_skipped_entries += result.skipped_entries;
            if result.outcome.is_completed() {
                stats.cycles_completed += 1;
            }
        }
        self.enter(SyncState::Idle);
        if !result.outcome.is_skipped() {
            tracing::info!(
                outcome = ?result.outcome,
                inserted = result.inserted,
                updated = result.updated,
                deleted = result.deleted_local,
                uploaded = result.uploaded,
                duration_ms = result.duration.as_millis() as u64,
                "sync finished"
            );
        }
        result
    }
}

impl<T: SyncTransport, S: EventStore> SyncRunner for SyncEngine<T, S> {
    fn run(&self, request: &SyncRequest) -> SyncCycleResult {
        self.sync(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettingsStore;
    use crate::transport::{MockFailure, MockTransport, TransportCall};
    use droidlink_store::{EventType, MemoryEventStore, NewEvent};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const ACCOUNT: &str = "me@example.com";
    const DEVICE: &str = "d1";

    struct Fixture {
        transport: Arc<MockTransport>,
        store: Arc<MemoryEventStore>,
        settings: Arc<MemorySettingsStore>,
        registrations: Arc<CountingRegistrar>,
        engine: SyncEngine<MockTransport, MemoryEventStore>,
    }

    #[derive(Default)]
    struct CountingRegistrar(AtomicUsize);

    impl DeviceRegistrar for CountingRegistrar {
        fn request_registration(&self, _force: bool) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fixture(remote: Vec<Value>) -> Fixture {
        let transport = Arc::new(MockTransport::with_remote_events(remote));
        let store = Arc::new(MemoryEventStore::in_memory());
        let settings = Arc::new(MemorySettingsStore::with_settings(Settings {
            account: Some(ACCOUNT.into()),
            device_id: Some(DEVICE.into()),
            ..Settings::default()
        }));
        let registrations = Arc::new(CountingRegistrar::default());
        let engine = SyncEngine::new(
            SyncConfig::default().with_debounce(Duration::ZERO),
            transport.clone(),
            store.clone(),
            settings.clone(),
        )
        .with_registrar(registrations.clone());
        Fixture {
            transport,
            store,
            settings,
            registrations,
            engine,
        }
    }

    fn local(id: &str, state: EventState) -> NewEvent {
        NewEvent::new(DEVICE, EventType::ReceivedSms)
            .with_id(id)
            .with_number("555")
            .with_state(state)
    }

    fn remote(id: &str, number: &str) -> Value {
        json!({"id": id, "deviceId": "d2", "created": 10, "type": 0, "number": number})
    }

    fn state_of(fixture: &Fixture, id: &str) -> Option<EventState> {
        fixture.store.get(id).unwrap().map(|e| e.state)
    }

    #[test]
    fn gates_run_in_order() {
        let f = fixture(vec![]);
        {
            let mut editor = SettingsEditor::begin(f.settings.as_ref()).unwrap();
            editor.sync_token = Some("tok".into());
        }

        let result = f.engine.sync(&SyncRequest::full("other@example.com").with_token("tok"));
        assert_eq!(result.outcome, CycleOutcome::Skipped(SkipReason::TokenMatch));

        let result = f.engine.sync(&SyncRequest::full("other@example.com"));
        assert_eq!(result.outcome, CycleOutcome::Skipped(SkipReason::AccountMismatch));

        assert!(f.transport.calls().is_empty());
        assert_eq!(f.engine.stats().cycles_skipped, 2);
        assert_eq!(f.settings.load().unwrap().last_sync, 0);
    }

    #[test]
    fn debounce_skips_recent_cycles() {
        let f = fixture(vec![]);
        let engine = SyncEngine::new(
            SyncConfig::default(),
            f.transport.clone(),
            f.store.clone(),
            f.settings.clone(),
        );

        assert!(engine.sync(&SyncRequest::light(ACCOUNT)).outcome.is_completed());
        assert_eq!(
            engine.sync(&SyncRequest::light(ACCOUNT)).outcome,
            CycleOutcome::Skipped(SkipReason::Debounced)
        );
    }

    #[test]
    fn clock_behind_last_sync_does_not_debounce() {
        let f = fixture(vec![]);
        {
            let mut editor = SettingsEditor::begin(f.settings.as_ref()).unwrap();
            editor.last_sync = now_millis() + 60_000;
        }
        let engine = SyncEngine::new(
            SyncConfig::default(),
            f.transport.clone(),
            f.store.clone(),
            f.settings.clone(),
        );
        assert!(engine.sync(&SyncRequest::light(ACCOUNT)).outcome.is_completed());
    }

    #[test]
    fn missing_device_is_skipped() {
        let f = fixture(vec![]);
        {
            let mut editor = SettingsEditor::begin(f.settings.as_ref()).unwrap();
            editor.device_id = None;
        }
        let result = f.engine.sync(&SyncRequest::full(ACCOUNT));
        assert_eq!(
            result.outcome,
            CycleOutcome::Skipped(SkipReason::DeviceNotConfigured)
        );
        assert_eq!(f.engine.stats().num_auth_exceptions, 1);
    }

    #[test]
    fn light_sync_does_not_download() {
        let f = fixture(vec![remote("E3", "1")]);
        f.store.insert(local("E1", EventState::PendingUpload)).unwrap();

        let result = f.engine.sync(&SyncRequest::light(ACCOUNT));
        assert!(result.outcome.is_completed());
        assert_eq!(result.uploaded, 1);
        assert!(f.store.get("E3").unwrap().is_none());
        assert!(!f.transport.calls().contains(&TransportCall::FetchEvents));
        assert_eq!(state_of(&f, "E1"), Some(EventState::Uploaded));
    }

    #[test]
    fn merge_refreshes_and_removes_synced_rows() {
        let f = fixture(vec![remote("E1", " 777 ")]);
        f.store.insert(local("E1", EventState::Uploaded)).unwrap();
        f.store.insert(local("E2", EventState::Uploaded)).unwrap();

        let result = f.engine.sync(&SyncRequest::full(ACCOUNT));
        assert!(result.outcome.is_completed());
        assert_eq!(result.updated, 1);
        assert_eq!(result.deleted_local, 1);
        assert_eq!(f.store.get("E1").unwrap().unwrap().number.as_deref(), Some("777"));
        assert!(f.store.get("E2").unwrap().is_none());
        assert_eq!(result.sync_token, None);
    }

    #[test]
    fn malformed_and_duplicate_remote_events_are_counted() {
        let f = fixture(vec![
            json!({"id": "E1", "deviceId": "d2", "created": 1, "type": 7}),
            json!("not an event"),
            remote("E3", "1"),
            remote("E3", "2"),
        ]);

        let result = f.engine.sync(&SyncRequest::full(ACCOUNT));
        assert!(result.outcome.is_completed());
        assert_eq!(result.inserted, 1);
        assert_eq!(result.skipped_entries, 3);
        assert_eq!(f.engine.stats().num_skipped_entries, 3);
    }

    #[test]
    fn pending_local_copy_is_not_merged() {
        let f = fixture(vec![remote("E1", "999")]);
        f.store.insert(local("E1", EventState::PendingDelete)).unwrap();
        f.transport.fail_delete("E1", MockFailure::Io);

        let result = f.engine.sync(&SyncRequest::full(ACCOUNT));
        assert!(matches!(
            result.outcome,
            CycleOutcome::Aborted {
                step: SyncState::UploadingDeletes,
                ..
            }
        ));
        assert_eq!(state_of(&f, "E1"), Some(EventState::PendingDelete));

        f.transport.clear_failures();
        f.store.update(&EventFilter::by_id("E1"), &EventPatch::state(EventState::PendingUpload)).unwrap();
        f.transport.fail_upload("E1", MockFailure::ServerFailure);
        let result = f.engine.sync(&SyncRequest::full(ACCOUNT));
        assert_eq!(result.inserted, 0);
        assert_eq!(f.store.get("E1").unwrap().unwrap().number.as_deref(), Some("555"));
    }

    #[test]
    fn delete_failure_keeps_earlier_deletes() {
        let f = fixture(vec![]);
        f.store
            .insert(local("A", EventState::PendingDelete).with_created(2))
            .unwrap();
        f.store
            .insert(local("B", EventState::PendingDelete).with_created(1))
            .unwrap();
        f.store.insert(local("C", EventState::PendingUpload)).unwrap();
        f.transport.fail_delete("B", MockFailure::Io);

        let result = f.engine.sync(&SyncRequest::full(ACCOUNT));
        assert!(matches!(result.outcome, CycleOutcome::Aborted { .. }));
        assert!(f.store.get("A").unwrap().is_none());
        assert_eq!(state_of(&f, "B"), Some(EventState::PendingDelete));
        assert_eq!(state_of(&f, "C"), Some(EventState::PendingUpload));
        assert!(!f.transport.calls().contains(&TransportCall::FetchEvents));
        assert_eq!(f.engine.stats().num_io_exceptions, 1);
        assert_ne!(f.settings.load().unwrap().last_sync, 0);
    }

    #[test]
    fn upload_failure_keeps_confirmed_uploads() {
        let f = fixture(vec![]);
        f.store
            .insert(local("A", EventState::PendingUpload).with_created(2))
            .unwrap();
        f.store
            .insert(local("B", EventState::PendingUpload).with_created(1))
            .unwrap();
        f.transport.fail_upload("B", MockFailure::ServerFailure);

        let result = f.engine.sync(&SyncRequest::light(ACCOUNT));
        assert!(matches!(
            result.outcome,
            CycleOutcome::Aborted {
                step: SyncState::UploadingCreates,
                ..
            }
        ));
        assert_eq!(state_of(&f, "A"), Some(EventState::Uploaded));
        assert_eq!(state_of(&f, "B"), Some(EventState::PendingUpload));
        assert_eq!(result.sync_token, None);
        assert_eq!(f.registrations.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn upload_not_found_requests_registration_once() {
        let f = fixture(vec![]);
        f.store.insert(local("E1", EventState::PendingUpload)).unwrap();
        f.transport.fail_upload("E1", MockFailure::NotFound);

        let result = f.engine.sync(&SyncRequest::light(ACCOUNT));
        assert!(result.registration_requested);
        assert!(matches!(result.outcome, CycleOutcome::Aborted { .. }));
        assert_eq!(f.registrations.0.load(Ordering::SeqCst), 1);
        assert_eq!(state_of(&f, "E1"), Some(EventState::PendingUpload));
    }

    #[test]
    fn broadcast_not_found_requests_registration_and_completes() {
        let f = fixture(vec![]);
        f.store.insert(local("E1", EventState::PendingUpload)).unwrap();
        f.transport.fail_broadcast(MockFailure::NotFound);

        let result = f.engine.sync(&SyncRequest::light(ACCOUNT));
        assert!(result.outcome.is_completed());
        assert!(result.registration_requested);
        assert_eq!(f.registrations.0.load(Ordering::SeqCst), 1);
        assert_eq!(f.settings.load().unwrap().sync_token, result.sync_token);
    }

    #[test]
    fn broadcast_failure_aborts_after_token_saved() {
        let f = fixture(vec![]);
        f.store.insert(local("E1", EventState::PendingUpload)).unwrap();
        f.transport.fail_broadcast(MockFailure::Io);

        let result = f.engine.sync(&SyncRequest::light(ACCOUNT));
        assert!(matches!(
            result.outcome,
            CycleOutcome::Aborted {
                step: SyncState::Finalizing,
                ..
            }
        ));
        assert!(f.settings.load().unwrap().sync_token.is_some());
        assert_eq!(state_of(&f, "E1"), Some(EventState::Uploaded));
    }

    #[test]
    fn permission_required_is_reported() {
        let f = fixture(vec![]);
        f.transport.fail_fetch(MockFailure::Permission);

        let result = f.engine.sync(&SyncRequest::full(ACCOUNT));
        assert!(matches!(result.outcome, CycleOutcome::PermissionRequired(_)));
        let stats = f.engine.stats();
        assert_eq!(stats.num_auth_exceptions, 1);
        assert_eq!(stats.cycles_aborted, 0);
        assert_eq!(f.engine.state(), SyncState::Idle);
    }

    #[test]
    fn authentication_failure_is_counted() {
        let f = fixture(vec![]);
        f.transport.fail_fetch(MockFailure::Auth);

        let result = f.engine.sync(&SyncRequest::full(ACCOUNT));
        assert!(matches!(
            result.outcome,
            CycleOutcome::Aborted {
                step: SyncState::DownloadingRemote,
                ..
            }
        ));
        assert_eq!(f.engine.stats().num_auth_exceptions, 1);
    }

    #[test]
    fn other_devices_pending_rows_are_not_pushed() {
        let f = fixture(vec![]);
        f.store
            .insert(
                NewEvent::new("d2", EventType::MissedCall)
                    .with_id("X")
                    .with_state(EventState::PendingUpload),
            )
            .unwrap();

        let result = f.engine.sync(&SyncRequest::light(ACCOUNT));
        assert!(result.outcome.is_completed());
        assert_eq!(result.uploaded, 0);
        assert!(f.transport.calls().is_empty());
    }

    #[test]
    fn observer_sees_running_cycles() {
        #[derive(Default)]
        struct Recorder(parking_lot::Mutex<Vec<bool>>);
        impl SyncObserver for Recorder {
            fn on_sync_running(&self, running: bool) {
                self.0.lock().push(running);
            }
        }

        let f = fixture(vec![]);
        let recorder = Arc::new(Recorder::default());
        let engine = SyncEngine::new(
            SyncConfig::default().with_debounce(Duration::ZERO),
            f.transport.clone(),
            f.store.clone(),
            f.settings.clone(),
        )
        .with_observer(recorder.clone());

        engine.sync(&SyncRequest::full(ACCOUNT));
        engine.sync(&SyncRequest::full("other@example.com"));
        assert_eq!(*recorder.0.lock(), vec![true, false]);
    }
}
