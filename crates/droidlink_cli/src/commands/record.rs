//! Record command implementation.

use crate::context::Context;
use clap::Subcommand;
use droidlink_sync_engine::EventRecorder;

/// Kind of event to record.
#[derive(Debug, Subcommand)]
pub enum RecordKind {
    /// A missed call
    Call {
        /// Caller number
        #[arg(short, long)]
        number: Option<String>,

        /// Caller name
        #[arg(long)]
        name: Option<String>,
    },

    /// A received text message
    Sms {
        /// Sender number
        #[arg(short, long)]
        number: Option<String>,

        /// Sender name
        #[arg(long)]
        name: Option<String>,

        /// Message body
        #[arg(short, long)]
        message: Option<String>,
    },
}

/// Records the event and pushes it unless offline.
pub fn run(context: &Context, kind: &RecordKind) -> Result<(), Box<dyn std::error::Error>> {
    let session = context.session()?;
    let recorder = EventRecorder::new(context.store().clone(), context.settings(), session.requester());

    let event = match kind {
        RecordKind::Call { number, name } => {
            recorder.record_missed_call(number.as_deref(), name.as_deref())?
        }
        RecordKind::Sms {
            number,
            name,
            message,
        } => recorder.record_received_sms(number.as_deref(), name.as_deref(), message.as_deref())?,
    };
    println!("Recorded {}", event.id);

    session.finish();
    Ok(())
}
