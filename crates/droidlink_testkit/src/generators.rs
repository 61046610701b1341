//! Property-based test generators using proptest.
//!
//! Strategies produce event content the way devices and servers send it:
//! padded, blank, the literal `"null"`, or absent.

use droidlink_store::{EventState, EventType, NewEvent};
use proptest::prelude::*;
use serde_json::{json, Value};

/// Strategy for strings that normalize to absent.
pub fn blank_text_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        prop::string::string_regex("[ \t\n]{1,4}").expect("Invalid regex"),
        Just("null".to_string()),
        Just("  null ".to_string()),
    ]
}

/// Strategy for non-blank content, possibly padded with whitespace.
pub fn padded_text_strategy() -> impl Strategy<Value = String> {
    (
        prop::string::string_regex("[ ]{0,2}").expect("Invalid regex"),
        prop::string::string_regex("[a-zA-Z0-9+][a-zA-Z0-9+ ]{0,15}[a-zA-Z0-9]").expect("Invalid regex"),
        prop::string::string_regex("[ \t]{0,2}").expect("Invalid regex"),
    )
        .prop_filter("\"null\" reads as absent", |(_, text, _)| text != "null")
        .prop_map(|(before, text, after)| format!("{before}{text}{after}"))
}

/// Strategy for an optional content field in any of its raw forms.
pub fn optional_text_strategy() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        blank_text_strategy().prop_map(Some),
        padded_text_strategy().prop_map(Some),
    ]
}

/// Strategy for event types.
pub fn event_type_strategy() -> impl Strategy<Value = EventType> {
    prop_oneof![Just(EventType::MissedCall), Just(EventType::ReceivedSms)]
}

/// Strategy for the states a live local row can hold.
pub fn event_state_strategy() -> impl Strategy<Value = EventState> {
    prop_oneof![
        Just(EventState::PendingUpload),
        Just(EventState::Uploaded),
        Just(EventState::PendingDelete),
    ]
}

/// Strategy for event identifiers.
pub fn event_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-f0-9]{8}").expect("Invalid regex")
}

/// Strategy for insert values of an event recorded on `device_id`.
pub fn new_event_strategy(device_id: &str) -> impl Strategy<Value = NewEvent> {
    let device_id = device_id.to_string();
    (
        event_type_strategy(),
        0i64..4_000_000_000_000,
        optional_text_strategy(),
        optional_text_strategy(),
        optional_text_strategy(),
    )
        .prop_map(move |(event_type, created, number, name, message)| NewEvent {
            device_id: Some(device_id.clone()),
            event_type: Some(event_type),
            created: Some(created),
            number,
            name,
            message,
            ..NewEvent::default()
        })
}

/// Strategy for a well-formed `GET /events` entry from one of `device_ids`.
pub fn remote_event_strategy(device_ids: Vec<String>) -> impl Strategy<Value = Value> {
    (
        event_id_strategy(),
        prop::sample::select(device_ids),
        event_type_strategy(),
        0i64..4_000_000_000_000,
        optional_text_strategy(),
        optional_text_strategy(),
    )
        .prop_map(|(id, device_id, event_type, created, number, message)| {
            let mut value = json!({
                "id": id,
                "deviceId": device_id,
                "created": created,
                "type": event_type.code(),
            });
            if let Some(number) = number {
                value["number"] = Value::String(number);
            }
            if let Some(message) = message {
                value["message"] = Value::String(message);
            }
            value
        })
}

/// Strategy for `GET /events` entries that cannot be decoded.
pub fn malformed_event_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!({"deviceId": "d", "created": 1, "type": 0})),
        Just(json!({"id": "", "deviceId": "d", "created": 1, "type": 0})),
        (2i32..100).prop_map(|code| json!({"id": "x", "deviceId": "d", "created": 1, "type": code})),
        Just(json!({"id": "x", "deviceId": "d", "created": "yesterday", "type": 0})),
        Just(json!("not an event")),
        Just(Value::Null),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use droidlink_store::trim_to_null;
    use droidlink_sync_protocol::EventPayload;

    proptest! {
        #[test]
        fn blank_text_is_absent(text in blank_text_strategy()) {
            prop_assert_eq!(trim_to_null(Some(text.as_str())), None);
        }

        #[test]
        fn padded_text_is_trimmed(text in padded_text_strategy()) {
            prop_assert_eq!(trim_to_null(Some(text.as_str())), Some(text.trim().to_string()));
        }

        #[test]
        fn inserted_content_is_normalized(values in new_event_strategy("d1")) {
            let expected = trim_to_null(values.number.as_deref());
            let event = values.into_event(0).unwrap();
            prop_assert_eq!(event.number, expected);
            for field in [&event.name, &event.message].into_iter().flatten() {
                prop_assert!(!field.trim().is_empty());
                prop_assert_eq!(field.trim(), field.as_str());
            }
        }

        #[test]
        fn remote_events_decode(value in remote_event_strategy(vec!["d1".into(), "d2".into()])) {
            let payload = EventPayload::from_value(value).unwrap();
            prop_assert!(payload.device_id == "d1" || payload.device_id == "d2");
            prop_assert!(payload.number.iter().all(|n| n.trim() == n && !n.is_empty()));
        }

        #[test]
        fn malformed_events_are_rejected(value in malformed_event_strategy()) {
            prop_assert!(EventPayload::from_value(value).is_err());
        }
    }
}
