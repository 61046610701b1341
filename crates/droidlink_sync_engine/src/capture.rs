//! Local event capture and housekeeping.
//!
//! Capture handlers and the purge run outside the sync worker. They only
//! touch the store through its atomic operations and then ask for a light
//! sync.

use crate::error::{SyncError, SyncResult};
use crate::settings::SettingsStore;
use crate::state::SyncRequest;
use crate::trigger::SyncRequester;
use droidlink_store::{
    Event, EventFilter, EventPatch, EventState, EventStore, EventType, NewEvent,
};
use std::sync::Arc;
use std::time::Duration;

/// Records events seen on this device.
pub struct EventRecorder<S: EventStore> {
    store: Arc<S>,
    settings: Arc<dyn SettingsStore>,
    requester: Arc<dyn SyncRequester>,
}

impl<S: EventStore> EventRecorder<S> {
    /// Creates a recorder.
    pub fn new(
        store: Arc<S>,
        settings: Arc<dyn SettingsStore>,
        requester: Arc<dyn SyncRequester>,
    ) -> Self {
        Self {
            store,
            settings,
            requester,
        }
    }

    /// Records a missed call.
    pub fn record_missed_call(&self, number: Option<&str>, name: Option<&str>) -> SyncResult<Event> {
        self.record(EventType::MissedCall, number, name, None)
    }

    /// Records a received text message.
    pub fn record_received_sms(
        &self,
        number: Option<&str>,
        name: Option<&str>,
        message: Option<&str>,
    ) -> SyncResult<Event> {
        self.record(EventType::ReceivedSms, number, name, message)
    }

    /// Marks an event for deletion on every device.
    ///
    /// Returns false if no such event exists.
    pub fn mark_deleted(&self, id: &str) -> SyncResult<bool> {
        let updated = self.store.update(
            &EventFilter::by_id(id).with_states(&[EventState::PendingUpload, EventState::Uploaded]),
            &EventPatch::state(EventState::PendingDelete),
        )?;
        if updated == 0 {
            return Ok(self.store.get(id)?.is_some());
        }
        tracing::info!(event_id = %id, "event marked for deletion");
        self.request_light_sync()?;
        Ok(true)
    }

    fn record(
        &self,
        event_type: EventType,
        number: Option<&str>,
        name: Option<&str>,
        message: Option<&str>,
    ) -> SyncResult<Event> {
        let settings = self.settings.load()?;
        let device_id = settings
            .device_id
            .ok_or(SyncError::NotConfigured("device id"))?;

        let mut values = NewEvent::new(device_id, event_type);
        values.number = number.map(str::to_string);
        values.name = name.map(str::to_string);
        values.message = message.map(str::to_string);
        let event = self.store.insert(values)?;
        tracing::info!(event_id = %event.id, event_type = ?event_type, "event recorded");

        self.request_light_sync()?;
        Ok(event)
    }

    fn request_light_sync(&self) -> SyncResult<()> {
        let Some(account) = self.settings.load()?.account else {
            tracing::debug!("no account selected, sync not requested");
            return Ok(());
        };
        if let Err(e) = self.requester.request(SyncRequest::light(account)) {
            tracing::warn!(error = %e, "sync request rejected");
        }
        Ok(())
    }
}

/// Marks old events for deletion.
pub struct EventPurger<S: EventStore> {
    store: Arc<S>,
    settings: Arc<dyn SettingsStore>,
    requester: Arc<dyn SyncRequester>,
    max_age: Duration,
}

impl<S: EventStore> EventPurger<S> {
    /// Creates a purger removing events older than `max_age`.
    pub fn new(
        store: Arc<S>,
        settings: Arc<dyn SettingsStore>,
        requester: Arc<dyn SyncRequester>,
        max_age: Duration,
    ) -> Self {
        Self {
            store,
            settings,
            requester,
            max_age,
        }
    }

    /// Marks every live event created at or before `now - max_age` as
    /// pending deletion and returns how many were marked.
    pub fn purge(&self, now: i64) -> SyncResult<usize> {
        let max_age = i64::try_from(self.max_age.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now.saturating_sub(max_age);
        let marked = self.store.update(
            &EventFilter::in_states(&[EventState::PendingUpload, EventState::Uploaded])
                .created_before(cutoff),
            &EventPatch::state(EventState::PendingDelete),
        )?;
        tracing::info!(marked, cutoff, "old events purged");

        if marked > 0 {
            match self.settings.load()?.account {
                Some(account) => {
                    if let Err(e) = self.requester.request(SyncRequest::light(account)) {
                        tracing::warn!(error = %e, "sync request rejected");
                    }
                }
                None => tracing::debug!("no account selected, sync not requested"),
            }
        }
        Ok(marked)
    }
}
