//! Register command implementation.

use crate::context::Context;
use droidlink_sync_engine::RegistrationService;

/// Uploads the device record.
pub fn run(context: &Context, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let account = context.account()?;
    let transport = context.transport(&account)?;
    let service = RegistrationService::new(transport, context.settings());

    if service.register(force)? {
        println!("Device registered");
    } else {
        println!("Device already registered (use --force to register again)");
    }
    Ok(())
}
