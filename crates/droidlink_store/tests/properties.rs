//! Property tests for the event store.

use droidlink_store::{
    BatchOperation, EventFilter, EventPatch, EventState, EventStore, EventType, MemoryEventStore,
    NewEvent,
};
use proptest::prelude::*;

fn blank() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[ \t]{1,6}",
        Just("null".to_string()),
    ]
}

proptest! {
    #[test]
    fn blank_fields_are_stored_as_absent(number in blank(), name in blank(), message in blank()) {
        let store = MemoryEventStore::in_memory();
        let event = store
            .insert(
                NewEvent::new("device-1", EventType::ReceivedSms)
                    .with_number(number)
                    .with_name(name)
                    .with_message(message),
            )
            .unwrap();

        prop_assert_eq!(event.number, None);
        prop_assert_eq!(event.name, None);
        prop_assert_eq!(event.message, None);
    }

    #[test]
    fn batch_is_all_or_nothing(
        existing in 1usize..6,
        inserts in 0usize..6,
        fail_at in 0usize..12,
    ) {
        let store = MemoryEventStore::in_memory();
        for i in 0..existing {
            store
                .insert(
                    NewEvent::new("device-1", EventType::MissedCall)
                        .with_id(format!("old-{i}"))
                        .with_state(EventState::Uploaded),
                )
                .unwrap();
        }
        let before = store.query(&EventFilter::all()).unwrap();

        let mut batch: Vec<BatchOperation> = (0..inserts)
            .map(|i| {
                BatchOperation::insert(
                    NewEvent::new("device-2", EventType::ReceivedSms).with_id(format!("new-{i}")),
                )
            })
            .collect();
        batch.push(BatchOperation::update(
            EventFilter::all(),
            EventPatch::content(Some("1"), None, None),
        ));
        batch.push(BatchOperation::delete_by_id("old-0"));

        let len = batch.len();
        store.inject_batch_failure(fail_at);
        let result = store.apply_batch(batch);

        if fail_at < len {
            prop_assert!(result.is_err());
            prop_assert_eq!(store.query(&EventFilter::all()).unwrap(), before);
        } else {
            prop_assert!(result.is_ok());
            prop_assert_eq!(store.len(), existing + inserts - 1);
        }
    }
}
