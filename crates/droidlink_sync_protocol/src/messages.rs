//! Wire messages.

use crate::error::{ProtocolError, ProtocolResult};
use droidlink_store::{trim_to_null, Event, EventState, EventType, NewEvent};
use serde::{Deserialize, Serialize};

/// JSON form of an event: `{id, deviceId, created, type, number, name, message}`.
///
/// `type` is the integer event type code. Absent content fields are
/// omitted on encode and accepted as missing, `null` or blank on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    /// Event identifier.
    pub id: String,
    /// Originating device.
    pub device_id: String,
    /// Creation time in epoch milliseconds.
    pub created: i64,
    /// Event type code.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Contact name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Message body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl EventPayload {
    /// Decodes one element of a `GET /events` array.
    ///
    /// Content fields are normalized so blank values become absent.
    pub fn from_value(value: serde_json::Value) -> ProtocolResult<Self> {
        let payload: EventPayload = serde_json::from_value(value)?;
        if payload.id.trim().is_empty() {
            return Err(ProtocolError::invalid_event("empty id"));
        }
        Ok(payload.normalized())
    }

    /// Encodes the payload as a JSON value.
    pub fn to_value(&self) -> ProtocolResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Returns the payload with blank content fields mapped to `None`.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            number: trim_to_null(self.number.as_deref()),
            name: trim_to_null(self.name.as_deref()),
            message: trim_to_null(self.message.as_deref()),
            ..self
        }
    }

    /// Insert values for a downloaded event, already known to the server.
    pub fn into_new_event(self) -> NewEvent {
        let payload = self.normalized();
        NewEvent {
            id: Some(payload.id),
            device_id: Some(payload.device_id),
            created: Some(payload.created),
            event_type: Some(payload.event_type),
            number: payload.number,
            name: payload.name,
            message: payload.message,
            state: Some(EventState::Uploaded),
        }
    }
}

impl From<&Event> for EventPayload {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id.clone(),
            device_id: event.device_id.clone(),
            created: event.created,
            event_type: event.event_type,
            number: event.number.clone(),
            name: event.name.clone(),
            message: event.message.clone(),
        }
    }
}

/// Body of `PUT /devices/{deviceId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRegistration {
    /// Human readable device name.
    pub name: String,
    /// Push registration token, if the device has one.
    #[serde(default)]
    pub c2dm: Option<String>,
}

impl DeviceRegistration {
    /// Creates a registration body.
    pub fn new(name: impl Into<String>, c2dm: Option<String>) -> Self {
        Self {
            name: name.into(),
            c2dm: trim_to_null(c2dm.as_deref()),
        }
    }
}

/// Body of `POST /devices/{deviceId}/sync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTokenMessage {
    /// Opaque token broadcast to the other devices of the account.
    pub token: String,
}

impl SyncTokenMessage {
    /// Creates a message with a fresh random token.
    pub fn generate() -> Self {
        Self {
            token: uuid::Uuid::new_v4().to_string(),
        }
    }
}
