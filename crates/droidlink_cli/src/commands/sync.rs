//! Sync command implementation.

use crate::context::Context;
use droidlink_sync_engine::{CycleOutcome, SkipReason, SyncCycleResult, SyncRequest, SyncStrategy};

/// Runs one cycle in the foreground.
///
/// Fails when the cycle aborts or needs a credential; a skipped cycle is
/// not an error.
pub fn run(context: &Context, light: bool, token: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let account = context.account()?;
    let services = context.engine(&account)?;

    let request = SyncRequest {
        account,
        strategy: if light {
            SyncStrategy::Light
        } else {
            SyncStrategy::Full
        },
        sync_token: token,
    };
    let result = services.engine.sync(&request);
    print_result(&result);
    services.finish();

    match result.outcome {
        CycleOutcome::Aborted { step, error } => Err(format!("Sync aborted while {step:?}: {error}").into()),
        CycleOutcome::PermissionRequired(grant) => Err(format!(
            "{} (pass --credential or set DROIDLINK_CREDENTIAL)",
            grant.prompt
        )
        .into()),
        CycleOutcome::Completed | CycleOutcome::Skipped(_) => Ok(()),
    }
}

/// Prints a one-line summary of a cycle.
pub fn print_result(result: &SyncCycleResult) {
    let strategy = match result.strategy {
        SyncStrategy::Full => "Full",
        SyncStrategy::Light => "Light",
    };
    match &result.outcome {
        CycleOutcome::Skipped(reason) => {
            println!("{strategy} sync skipped: {}", skip_reason(*reason));
        }
        CycleOutcome::Aborted { step, .. } => {
            println!("{strategy} sync aborted while {step:?}");
        }
        CycleOutcome::PermissionRequired(_) => {
            println!("{strategy} sync needs a credential");
        }
        CycleOutcome::Completed => {
            println!(
                "{strategy} sync done in {} ms: {} uploaded, {} deleted remotely, {} new, {} updated, {} removed",
                result.duration.as_millis(),
                result.uploaded,
                result.deleted_remote,
                result.inserted,
                result.updated,
                result.deleted_local,
            );
        }
    }
    if result.skipped_entries > 0 {
        println!("  {} malformed entries skipped", result.skipped_entries);
    }
    if result.registration_requested {
        println!("  device registration requested");
    }
}

fn skip_reason(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::TokenMatch => "sync token already seen",
        SkipReason::AccountMismatch => "request is for another account",
        SkipReason::Debounced => "last sync too recent",
        SkipReason::DeviceNotConfigured => "no device identifier, run `droidlink init`",
    }
}
