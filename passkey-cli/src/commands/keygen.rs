//! Keygen command implementation.

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;
use passkey_core::{KeyAlgorithm, SoftAuthenticator};
use tracing::info;

use crate::utils::{ensure_writable, save_authenticator};

/// Execute the keygen command.
pub fn execute(algorithm: KeyAlgorithm, output: PathBuf, force: bool, quiet: bool) -> Result<()> {
    ensure_writable(&output, force)?;

    let device = SoftAuthenticator::generate(algorithm);
    let public_key = device.public_key_text()?;
    save_authenticator(&device, &output)?;

    info!(
        path = %output.display(),
        algorithm = algorithm.as_str(),
        credential_id = %device.credential_id_text(),
        "Generated software authenticator"
    );

    if !quiet {
        println!("{}", "Software authenticator created".green().bold());
        println!("   {} {}", "Algorithm:".dimmed(), algorithm.as_str());
        println!("   {} {}", "Credential ID:".dimmed(), device.credential_id_text());
        println!("   {} {}", "Public key:".dimmed(), public_key);
        println!("   {} {}", "Saved to:".dimmed(), output.display());
        println!();
        println!(
            "   {}",
            "The key file holds the secret key in the clear; keep it out of version control."
                .yellow()
        );
    }
    Ok(())
}
