//! Assert command implementation.

use std::path::PathBuf;

use anyhow::Result;
use passkey_core::RequestOptions;
use tracing::info;

use crate::utils::{load_authenticator, read_json, save_authenticator, write_json};

/// Execute the assert command.
///
/// Bumps the authenticator's sign count and writes it back to the key file
/// before printing the response, so a replayed key file is detectable.
pub fn execute(key: PathBuf, options: PathBuf, origin: String, output: Option<PathBuf>) -> Result<()> {
    let mut device = load_authenticator(&key)?;
    let options: RequestOptions = read_json(&options, "options")?;

    if !options.allow_credentials.is_empty()
        && !options
            .allow_credentials
            .iter()
            .any(|c| c.id == device.credential_id_text())
    {
        tracing::warn!(
            credential_id = %device.credential_id_text(),
            "Credential is not in allowCredentials; the relying party will likely reject it"
        );
    }

    let response = device.assert(&options, &origin);
    save_authenticator(&device, &key)?;

    info!(
        rp_id = %options.rp_id,
        sign_count = device.sign_count(),
        "Built assertion response"
    );

    write_json(&response, output.as_deref())
}
