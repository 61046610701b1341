//! Collaborators informed of sync activity.

use crate::settings::{SettingsEditor, SettingsStore};
use parking_lot::Mutex;
use std::sync::Arc;

/// Receives the events inserted by a full reconciliation.
pub trait NewEventNotifier: Send + Sync {
    /// `count` events arrived; `event_id` is set when exactly one did.
    fn on_new_events(&self, count: usize, event_id: Option<&str>);
}

/// Observes whether a sync cycle is running.
pub trait SyncObserver: Send + Sync {
    /// Called with `true` when a cycle passes the gates and with `false`
    /// when it ends.
    fn on_sync_running(&self, running: bool);
}

/// A notifier that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl NewEventNotifier for NoopNotifier {
    fn on_new_events(&self, _count: usize, _event_id: Option<&str>) {}
}

/// What the user should be shown after new events arrive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// One unread event; opens its details.
    Single {
        /// The unread event.
        event_id: String,
    },
    /// Several unread events; opens the list.
    Summary {
        /// Number of unread events.
        unread: u32,
    },
}

/// Keeps the persisted unread counter and derives the notification.
///
/// Nothing is counted while the event list is on screen.
pub struct UnreadCounterNotifier {
    settings: Arc<dyn SettingsStore>,
    latest: Mutex<Option<Notification>>,
}

impl UnreadCounterNotifier {
    /// Creates a notifier backed by `settings`.
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            settings,
            latest: Mutex::new(None),
        }
    }

    /// Returns the notification currently shown, if any.
    pub fn latest(&self) -> Option<Notification> {
        self.latest.lock().clone()
    }

    /// Marks everything read and dismisses the notification.
    pub fn clear(&self) {
        match SettingsEditor::begin(self.settings.as_ref()) {
            Ok(mut editor) => {
                editor.unread_events = 0;
                if let Err(e) = editor.commit() {
                    tracing::warn!(error = %e, "failed to reset unread counter");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to reset unread counter"),
        }
        *self.latest.lock() = None;
    }

    fn record(&self, count: usize, event_id: Option<&str>) -> crate::SyncResult<Option<Notification>> {
        let mut editor = SettingsEditor::begin(self.settings.as_ref())?;
        if editor.event_list_visible {
            return Ok(None);
        }

        let unread = editor
            .unread_events
            .saturating_add(u32::try_from(count).unwrap_or(u32::MAX));
        editor.unread_events = unread;
        editor.commit()?;

        let notification = match event_id {
            Some(id) if unread == 1 => Notification::Single {
                event_id: id.to_string(),
            },
            _ => Notification::Summary { unread },
        };
        Ok(Some(notification))
    }
}

impl NewEventNotifier for UnreadCounterNotifier {
    fn on_new_events(&self, count: usize, event_id: Option<&str>) {
        if count == 0 {
            return;
        }
        if count == 1 && event_id.is_none() {
            tracing::error!("missing event identifier for a single new event");
            return;
        }

        match self.record(count, event_id) {
            Ok(Some(notification)) => {
                tracing::info!(?notification, "new event notification");
                *self.latest.lock() = Some(notification);
            }
            Ok(None) => tracing::debug!(count, "event list visible, notification skipped"),
            Err(e) => tracing::warn!(error = %e, "failed to record new events"),
        }
    }
}
