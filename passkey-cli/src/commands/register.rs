//! Register command implementation.
//!
//! Answers registration options the way a browser would relay an
//! authenticator's response.

use std::path::PathBuf;

use anyhow::Result;
use passkey_core::CreationOptions;
use tracing::info;

use crate::utils::{load_authenticator, read_json, save_authenticator, write_json};

/// Execute the register command.
pub fn execute(key: PathBuf, options: PathBuf, origin: String, output: Option<PathBuf>) -> Result<()> {
    let mut device = load_authenticator(&key)?;
    let options: CreationOptions = read_json(&options, "options")?;

    let response = device.register(&options, &origin)?;
    // the user handle from the options is needed for later assertions
    save_authenticator(&device, &key)?;

    info!(
        rp_id = %options.rp.id,
        credential_id = %response.id,
        "Built registration response"
    );

    write_json(&response, output.as_deref())
}
