//! Server-side state: events, devices and sync broadcasts per account.

use crate::error::{ServerError, ServerResult};
use droidlink_sync_protocol::{DeviceRegistration, EventPayload};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// A sync token broadcast by one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    /// Sending device.
    pub device_id: String,
    /// The token.
    pub token: String,
    /// Devices of the account that should receive it.
    pub recipients: Vec<String>,
}

#[derive(Debug, Default)]
struct AccountData {
    events: BTreeMap<String, EventPayload>,
    raw_events: Vec<Value>,
    devices: BTreeMap<String, DeviceRegistration>,
    broadcasts: Vec<Broadcast>,
}

/// In-memory state of every account.
#[derive(Debug, Default)]
pub struct Registry {
    accounts: RwLock<HashMap<String, AccountData>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the account's events as served by `GET /events`.
    pub fn events(&self, account: &str) -> ServerResult<Vec<Value>> {
        let accounts = self.accounts.read();
        let Some(data) = accounts.get(account) else {
            return Ok(Vec::new());
        };
        let mut values = Vec::with_capacity(data.events.len() + data.raw_events.len());
        for event in data.events.values() {
            values.push(serde_json::to_value(event).map_err(|e| ServerError::Internal(e.to_string()))?);
        }
        values.extend(data.raw_events.iter().cloned());
        Ok(values)
    }

    /// Returns one event.
    pub fn event(&self, account: &str, id: &str) -> Option<EventPayload> {
        self.accounts
            .read()
            .get(account)
            .and_then(|data| data.events.get(id).cloned())
    }

    /// Number of events stored for the account.
    pub fn event_count(&self, account: &str) -> usize {
        self.accounts
            .read()
            .get(account)
            .map_or(0, |data| data.events.len())
    }

    /// Upserts an event. The owning device must be registered.
    ///
    /// Returns true if the event was new.
    pub fn put_event(&self, account: &str, event: EventPayload) -> ServerResult<bool> {
        let mut accounts = self.accounts.write();
        let data = accounts.entry(account.to_string()).or_default();
        if !data.devices.contains_key(&event.device_id) {
            return Err(ServerError::NotFound(format!("device {}", event.device_id)));
        }
        Ok(data.events.insert(event.id.clone(), event).is_none())
    }

    /// Stores an event without validation, as another server version might.
    pub fn put_raw_event(&self, account: &str, value: Value) {
        self.accounts
            .write()
            .entry(account.to_string())
            .or_default()
            .raw_events
            .push(value);
    }

    /// Removes an event. Returns true if it existed.
    pub fn delete_event(&self, account: &str, id: &str) -> bool {
        self.accounts
            .write()
            .get_mut(account)
            .is_some_and(|data| data.events.remove(id).is_some())
    }

    /// Upserts a device. Returns true if the device was new.
    pub fn register_device(
        &self,
        account: &str,
        device_id: &str,
        registration: DeviceRegistration,
    ) -> bool {
        self.accounts
            .write()
            .entry(account.to_string())
            .or_default()
            .devices
            .insert(device_id.to_string(), registration)
            .is_none()
    }

    /// Returns the registration of a device.
    pub fn device(&self, account: &str, device_id: &str) -> Option<DeviceRegistration> {
        self.accounts
            .read()
            .get(account)
            .and_then(|data| data.devices.get(device_id).cloned())
    }

    /// Records a token broadcast from a registered device to the
    /// account's other devices.
    pub fn broadcast(&self, account: &str, device_id: &str, token: String) -> ServerResult<Broadcast> {
        let mut accounts = self.accounts.write();
        let data = accounts
            .get_mut(account)
            .filter(|data| data.devices.contains_key(device_id))
            .ok_or_else(|| ServerError::NotFound(format!("device {device_id}")))?;

        let recipients = data
            .devices
            .keys()
            .filter(|id| id.as_str() != device_id)
            .cloned()
            .collect();
        let broadcast = Broadcast {
            device_id: device_id.to_string(),
            token,
            recipients,
        };
        data.broadcasts.push(broadcast.clone());
        Ok(broadcast)
    }

    /// Returns the account's broadcasts, oldest first.
    pub fn broadcasts(&self, account: &str) -> Vec<Broadcast> {
        self.accounts
            .read()
            .get(account)
            .map(|data| data.broadcasts.clone())
            .unwrap_or_default()
    }
}
