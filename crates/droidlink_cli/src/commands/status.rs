//! Status command implementation.

use crate::commands::list::state_name;
use crate::context::Context;
use droidlink_store::{EventFilter, EventState, EventStore};
use serde::Serialize;
use std::collections::BTreeMap;

/// Device status.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Data directory.
    pub data_dir: String,
    /// API base URL.
    pub server: String,
    /// Selected account.
    pub account: Option<String>,
    /// Device identifier.
    pub device_id: Option<String>,
    /// Device name.
    pub device_name: Option<String>,
    /// Whether the device record reached the server.
    pub registered: bool,
    /// End of the last sync cycle, epoch milliseconds (0 if never).
    pub last_sync: i64,
    /// Last sync token generated by this device.
    pub sync_token: Option<String>,
    /// Unread downloaded events.
    pub unread_events: u32,
    /// Event count per state.
    pub events: BTreeMap<&'static str, usize>,
}

/// Shows settings and event counts.
pub fn run(context: &Context, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let settings = context.settings().load()?;
    let mut events = BTreeMap::new();
    for state in [
        EventState::PendingUpload,
        EventState::Uploaded,
        EventState::PendingDelete,
    ] {
        let count = context.store().count(&EventFilter::in_states(&[state]))?;
        events.insert(state_name(state), count);
    }

    let report = StatusReport {
        data_dir: context.data_dir().display().to_string(),
        server: context.config().base_url(),
        account: settings.account,
        device_id: settings.device_id,
        device_name: settings.device_name,
        registered: settings.registration_done,
        last_sync: settings.last_sync,
        sync_token: settings.sync_token,
        unread_events: settings.unread_events,
        events,
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => print_text_output(&report),
    }
    Ok(())
}

fn print_text_output(report: &StatusReport) {
    let unset = || "(not set)".to_string();
    println!("DroidLink Status");
    println!("================");
    println!();
    println!("Data directory: {}", report.data_dir);
    println!("Server:         {}", report.server);
    println!();
    println!("Device:");
    println!("  Account:    {}", report.account.clone().unwrap_or_else(unset));
    println!("  Id:         {}", report.device_id.clone().unwrap_or_else(unset));
    println!("  Name:       {}", report.device_name.clone().unwrap_or_else(unset));
    println!("  Registered: {}", if report.registered { "yes" } else { "no" });
    println!();
    println!("Sync:");
    if report.last_sync > 0 {
        println!("  Last sync:  {} ms since epoch", report.last_sync);
    } else {
        println!("  Last sync:  never");
    }
    println!("  Token:      {}", report.sync_token.clone().unwrap_or_else(unset));
    println!("  Unread:     {}", report.unread_events);
    println!();
    println!("Events:");
    for (state, count) in &report.events {
        println!("  {state:<15} {count}");
    }
}
