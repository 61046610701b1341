//! List command implementation.

use crate::context::Context;
use droidlink_store::{Event, EventFilter, EventState, EventStore, EventType};
use droidlink_sync_engine::UnreadCounterNotifier;
use serde::Serialize;

/// One listed event.
#[derive(Debug, Serialize)]
pub struct EventRow {
    /// Event identifier.
    pub id: String,
    /// Originating device.
    pub device_id: String,
    /// Creation time in epoch milliseconds.
    pub created: i64,
    /// `call` or `sms`.
    pub kind: &'static str,
    /// Sync state.
    pub state: &'static str,
    /// Phone number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Contact name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Message body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<Event> for EventRow {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            device_id: event.device_id,
            created: event.created,
            kind: kind_name(event.event_type),
            state: state_name(event.state),
            number: event.number,
            name: event.name,
            message: event.message,
        }
    }
}

/// Lists local events, newest first, and marks them read.
pub fn run(context: &Context, all: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let filter = if all {
        EventFilter::all()
    } else {
        EventFilter::in_states(&[EventState::PendingUpload, EventState::Uploaded])
    };
    let rows: Vec<EventRow> = context
        .store()
        .query(&filter)?
        .into_iter()
        .map(EventRow::from)
        .collect();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        _ => print_text_output(&rows),
    }

    UnreadCounterNotifier::new(context.settings()).clear();
    Ok(())
}

fn print_text_output(rows: &[EventRow]) {
    if rows.is_empty() {
        println!("No events");
        return;
    }
    for row in rows {
        let who = match (&row.name, &row.number) {
            (Some(name), Some(number)) => format!("{name} <{number}>"),
            (Some(name), None) => name.clone(),
            (None, Some(number)) => number.clone(),
            (None, None) => "unknown".to_string(),
        };
        println!(
            "{}  {:<4} {:<14} {}  {}",
            row.id, row.kind, row.state, row.created, who
        );
        if let Some(message) = &row.message {
            println!("    {message}");
        }
    }
}

/// Short name of an event type.
pub fn kind_name(event_type: EventType) -> &'static str {
    match event_type {
        EventType::MissedCall => "call",
        EventType::ReceivedSms => "sms",
    }
}

/// Short name of an event state.
pub fn state_name(state: EventState) -> &'static str {
    match state {
        EventState::PendingUpload => "pending-upload",
        EventState::Uploaded => "uploaded",
        EventState::PendingDelete => "pending-delete",
        EventState::Deleted => "deleted",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use droidlink_store::NewEvent;

    #[test]
    fn rows_name_kind_and_state() {
        let event = NewEvent::new("d1", EventType::ReceivedSms)
            .with_id("E1")
            .with_message(" hi ")
            .into_event(7)
            .unwrap();
        let row = EventRow::from(event);
        assert_eq!(row.kind, "sms");
        assert_eq!(row.state, "pending-upload");
        assert_eq!(row.message.as_deref(), Some("hi"));

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["created"], 7);
        assert!(json.get("number").is_none());
    }
}
