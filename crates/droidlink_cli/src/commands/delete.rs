//! Delete command implementation.

use crate::context::Context;
use droidlink_sync_engine::EventRecorder;

/// Marks the event for deletion on every device.
pub fn run(context: &Context, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let session = context.session()?;
    let recorder = EventRecorder::new(context.store().clone(), context.settings(), session.requester());

    if !recorder.mark_deleted(id)? {
        return Err(format!("No event with id {id}").into());
    }
    println!("Deleted {id}");

    session.finish();
    Ok(())
}
