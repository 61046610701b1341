//! Purge command implementation.

use crate::context::Context;
use droidlink_store::now_millis;
use droidlink_sync_engine::EventPurger;
use std::time::Duration;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Marks events older than the maximum age for deletion.
pub fn run(context: &Context, max_age_days: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let max_age = max_age_days
        .map(|days| Duration::from_secs(days.saturating_mul(SECONDS_PER_DAY)))
        .unwrap_or(context.config().event_max_age);

    let session = context.session()?;
    let purger = EventPurger::new(
        context.store().clone(),
        context.settings(),
        session.requester(),
        max_age,
    );
    let marked = purger.purge(now_millis())?;
    println!("Marked {marked} events for deletion");

    session.finish();
    Ok(())
}
