//! Event model.
//!
//! An [`Event`] is a single phone occurrence shared across the devices of
//! one account. Its lifecycle is tracked locally through [`EventState`]:
//!
//! ```text
//! PENDING_UPLOAD ──upload──▶ UPLOADED ──user delete──▶ PENDING_DELETE ──remote delete──▶ (removed)
//! ```
//!
//! Rows downloaded from the server start at `UPLOADED`.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Kind of phone event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum EventType {
    /// A call that was not answered.
    MissedCall,
    /// An incoming text message.
    ReceivedSms,
}

impl EventType {
    /// Returns the persisted integer code.
    pub fn code(self) -> i32 {
        match self {
            EventType::MissedCall => 0,
            EventType::ReceivedSms => 1,
        }
    }

    /// Decodes a persisted integer code.
    pub fn from_code(code: i32) -> StoreResult<Self> {
        match code {
            0 => Ok(EventType::MissedCall),
            1 => Ok(EventType::ReceivedSms),
            _ => Err(StoreError::InvalidCode {
                field: "type",
                code,
            }),
        }
    }
}

impl From<EventType> for i32 {
    fn from(value: EventType) -> Self {
        value.code()
    }
}

impl TryFrom<i32> for EventType {
    type Error = StoreError;

    fn try_from(code: i32) -> StoreResult<Self> {
        Self::from_code(code)
    }
}

/// Local synchronization state of an event row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum EventState {
    /// Created locally, not yet known to the server.
    PendingUpload,
    /// Known to the server.
    Uploaded,
    /// Deleted by the user, waiting for the remote delete.
    PendingDelete,
    /// Terminal marker observed transiently before the row is removed.
    Deleted,
}

impl EventState {
    /// Returns the persisted integer code.
    pub fn code(self) -> i32 {
        match self {
            EventState::PendingUpload => 0,
            EventState::Uploaded => 1,
            EventState::PendingDelete => 2,
            EventState::Deleted => 3,
        }
    }

    /// Decodes a persisted integer code.
    pub fn from_code(code: i32) -> StoreResult<Self> {
        match code {
            0 => Ok(EventState::PendingUpload),
            1 => Ok(EventState::Uploaded),
            2 => Ok(EventState::PendingDelete),
            3 => Ok(EventState::Deleted),
            _ => Err(StoreError::InvalidCode {
                field: "state",
                code,
            }),
        }
    }

    /// Returns true if the row still has local changes to push.
    pub fn is_pending(self) -> bool {
        matches!(self, EventState::PendingUpload | EventState::PendingDelete)
    }
}

impl From<EventState> for i32 {
    fn from(value: EventState) -> Self {
        value.code()
    }
}

impl TryFrom<i32> for EventState {
    type Error = StoreError;

    fn try_from(code: i32) -> StoreResult<Self> {
        Self::from_code(code)
    }
}

/// A stored event row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Globally unique identifier, shared with the remote copy.
    pub id: String,
    /// Originating device.
    pub device_id: String,
    /// Creation time in epoch milliseconds. Never mutated.
    pub created: i64,
    /// Kind of event.
    pub event_type: EventType,
    /// Phone number, if known.
    pub number: Option<String>,
    /// Contact name, if known.
    pub name: Option<String>,
    /// Message body for SMS events.
    pub message: Option<String>,
    /// Local synchronization state.
    pub state: EventState,
}

/// Values for a row to insert.
///
/// `id`, `created` and `state` are filled in on insert when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewEvent {
    /// Identifier; a random UUID is assigned when absent.
    pub id: Option<String>,
    /// Originating device. Required.
    pub device_id: Option<String>,
    /// Creation time; defaults to now.
    pub created: Option<i64>,
    /// Kind of event. Required.
    pub event_type: Option<EventType>,
    /// Phone number.
    pub number: Option<String>,
    /// Contact name.
    pub name: Option<String>,
    /// Message body.
    pub message: Option<String>,
    /// Initial state; defaults to [`EventState::PendingUpload`].
    pub state: Option<EventState>,
}

impl NewEvent {
    /// Creates insert values for an event of `event_type` on `device_id`.
    pub fn new(device_id: impl Into<String>, event_type: EventType) -> Self {
        Self {
            device_id: Some(device_id.into()),
            event_type: Some(event_type),
            ..Self::default()
        }
    }

    /// Sets the identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the creation time.
    #[must_use]
    pub fn with_created(mut self, created: i64) -> Self {
        self.created = Some(created);
        self
    }

    /// Sets the initial state.
    #[must_use]
    pub fn with_state(mut self, state: EventState) -> Self {
        self.state = Some(state);
        self
    }

    /// Sets the phone number.
    #[must_use]
    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.number = Some(number.into());
        self
    }

    /// Sets the contact name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the message body.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Resolves defaults and normalizes optional fields into a row.
    pub fn into_event(self, now: i64) -> StoreResult<Event> {
        let device_id = self
            .device_id
            .filter(|d| !d.trim().is_empty())
            .ok_or(StoreError::MissingField("device_id"))?;
        let event_type = self.event_type.ok_or(StoreError::MissingField("type"))?;

        Ok(Event {
            id: self
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            device_id,
            created: self.created.unwrap_or(now),
            event_type,
            number: trim_to_null(self.number.as_deref()),
            name: trim_to_null(self.name.as_deref()),
            message: trim_to_null(self.message.as_deref()),
            state: self.state.unwrap_or(EventState::PendingUpload),
        })
    }
}

impl From<Event> for NewEvent {
    fn from(event: Event) -> Self {
        Self {
            id: Some(event.id),
            device_id: Some(event.device_id),
            created: Some(event.created),
            event_type: Some(event.event_type),
            number: event.number,
            name: event.name,
            message: event.message,
            state: Some(event.state),
        }
    }
}

/// Trims `value`, mapping blank strings and the literal `"null"` to `None`.
///
/// JSON encoders on some platforms render a null field as the string
/// `"null"`, so it is treated as absent too.
pub fn trim_to_null(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() || trimmed == "null" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Returns the current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_persisted_schema() {
        assert_eq!(EventType::MissedCall.code(), 0);
        assert_eq!(EventType::ReceivedSms.code(), 1);
        assert_eq!(EventState::PendingUpload.code(), 0);
        assert_eq!(EventState::Uploaded.code(), 1);
        assert_eq!(EventState::PendingDelete.code(), 2);
        assert!(EventState::from_code(7).is_err());
        assert!(EventType::from_code(-1).is_err());
    }

    #[test]
    fn trim_to_null_normalization() {
        assert_eq!(trim_to_null(None), None);
        assert_eq!(trim_to_null(Some("")), None);
        assert_eq!(trim_to_null(Some("   ")), None);
        assert_eq!(trim_to_null(Some("null")), None);
        assert_eq!(trim_to_null(Some(" 555 ")), Some("555".to_string()));
    }

    #[test]
    fn defaults_are_filled_on_insert() {
        let event = NewEvent::new("device-1", EventType::MissedCall)
            .with_number("")
            .with_name(" Alice ")
            .into_event(1_000)
            .unwrap();

        assert!(uuid::Uuid::parse_str(&event.id).is_ok());
        assert_eq!(event.created, 1_000);
        assert_eq!(event.state, EventState::PendingUpload);
        assert_eq!(event.number, None);
        assert_eq!(event.name.as_deref(), Some("Alice"));
    }

    #[test]
    fn required_fields() {
        let missing_device = NewEvent {
            event_type: Some(EventType::ReceivedSms),
            ..NewEvent::default()
        };
        assert!(matches!(
            missing_device.into_event(0),
            Err(StoreError::MissingField("device_id"))
        ));

        let missing_type = NewEvent {
            device_id: Some("d".into()),
            ..NewEvent::default()
        };
        assert!(matches!(
            missing_type.into_event(0),
            Err(StoreError::MissingField("type"))
        ));
    }

    #[test]
    fn serde_uses_integer_codes() {
        let event = NewEvent::new("d", EventType::ReceivedSms)
            .with_id("e1")
            .into_event(5)
            .unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], 1);
        assert_eq!(json["state"], 0);
    }
}
