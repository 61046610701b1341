//! Row predicates and partial updates.

use crate::event::{trim_to_null, Event, EventState};

/// A conjunction of optional conditions selecting event rows.
///
/// An empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Exact identifier.
    pub id: Option<String>,
    /// Any of these states.
    pub states: Option<Vec<EventState>>,
    /// Exact originating device.
    pub device_id: Option<String>,
    /// Created at or after this time (inclusive).
    pub created_after: Option<i64>,
    /// Created at or before this time (inclusive).
    pub created_before: Option<i64>,
}

impl EventFilter {
    /// Matches every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches the row with the given identifier.
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Matches rows in any of the given states.
    pub fn in_states(states: &[EventState]) -> Self {
        Self::default().with_states(states)
    }

    /// Restricts to rows in any of the given states.
    #[must_use]
    pub fn with_states(mut self, states: &[EventState]) -> Self {
        self.states = Some(states.to_vec());
        self
    }

    /// Restricts to rows from the given device.
    #[must_use]
    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Restricts to rows created at or after `millis`.
    #[must_use]
    pub fn created_after(mut self, millis: i64) -> Self {
        self.created_after = Some(millis);
        self
    }

    /// Restricts to rows created at or before `millis`.
    #[must_use]
    pub fn created_before(mut self, millis: i64) -> Self {
        self.created_before = Some(millis);
        self
    }

    /// Returns true if `event` satisfies every condition.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(id) = &self.id {
            if &event.id != id {
                return false;
            }
        }
        if let Some(states) = &self.states {
            if !states.contains(&event.state) {
                return false;
            }
        }
        if let Some(device_id) = &self.device_id {
            if &event.device_id != device_id {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if event.created < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if event.created > before {
                return false;
            }
        }
        true
    }
}

/// A partial update of the mutable columns of an event.
///
/// Content fields use `Option<Option<String>>`: the outer `None` leaves the
/// column untouched, `Some(None)` clears it. Blank strings are stored as
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPatch {
    /// New state.
    pub state: Option<EventState>,
    /// New phone number.
    pub number: Option<Option<String>>,
    /// New contact name.
    pub name: Option<Option<String>>,
    /// New message body.
    pub message: Option<Option<String>>,
}

impl EventPatch {
    /// A patch that only changes the state.
    pub fn state(state: EventState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    /// A patch replacing the three content fields.
    pub fn content(number: Option<&str>, name: Option<&str>, message: Option<&str>) -> Self {
        Self {
            state: None,
            number: Some(trim_to_null(number)),
            name: Some(trim_to_null(name)),
            message: Some(trim_to_null(message)),
        }
    }

    /// Sets the phone number.
    #[must_use]
    pub fn with_number(mut self, number: Option<&str>) -> Self {
        self.number = Some(trim_to_null(number));
        self
    }

    /// Sets the contact name.
    #[must_use]
    pub fn with_name(mut self, name: Option<&str>) -> Self {
        self.name = Some(trim_to_null(name));
        self
    }

    /// Sets the message body.
    #[must_use]
    pub fn with_message(mut self, message: Option<&str>) -> Self {
        self.message = Some(trim_to_null(message));
        self
    }

    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.number.is_none() && self.name.is_none() && self.message.is_none()
    }

    /// Applies the patch in place.
    pub fn apply(&self, event: &mut Event) {
        if let Some(state) = self.state {
            event.state = state;
        }
        if let Some(number) = &self.number {
            event.number = trim_to_null(number.as_deref());
        }
        if let Some(name) = &self.name {
            event.name = trim_to_null(name.as_deref());
        }
        if let Some(message) = &self.message {
            event.message = trim_to_null(message.as_deref());
        }
    }
}
