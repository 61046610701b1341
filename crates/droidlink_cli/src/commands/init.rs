//! Init command implementation.

use crate::context::Context;
use droidlink_store::trim_to_null;
use droidlink_sync_engine::{DeviceIdentity, SettingsEditor};

/// Selects `account` and makes sure this device has an identifier for it.
///
/// A new name or push token invalidates the server's copy of the device
/// record, so the next `register` uploads it again.
pub fn run(
    context: &Context,
    account: &str,
    name: Option<&str>,
    push_token: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = context.settings();
    let identity = DeviceIdentity::ensure(settings.as_ref(), account)?;

    let name = trim_to_null(name);
    let push_token = trim_to_null(push_token);
    if name.is_some() || push_token.is_some() {
        let mut editor = SettingsEditor::begin(settings.as_ref())?;
        if let Some(name) = name {
            editor.device_name = Some(name);
        }
        if let Some(token) = push_token {
            editor.push_token = Some(token);
        }
        editor.registration_done = false;
        editor.commit()?;
    }

    let current = DeviceIdentity::current(settings.as_ref())?.unwrap_or(identity);
    println!("Account: {}", current.account);
    println!("Device:  {} ({})", current.device_id, current.device_name);
    Ok(())
}
