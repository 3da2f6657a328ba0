//! Check command implementation.
//!
//! Runs the server's assertion checks against a captured login response
//! without touching any store. Useful for debugging a rejected device.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use passkey_core::{
    codec, AssertionContext, AssertionValidator, AuthenticationResponse, Credential, CredentialId,
    UserHandle,
};
use tracing::debug;

use crate::utils::read_json;

/// Stored credential and relying party the response is checked against.
pub struct CheckArgs {
    pub response: PathBuf,
    pub public_key: String,
    pub algorithm: i32,
    pub challenge: String,
    pub rp_id: String,
    pub origin: Option<String>,
    pub stored_count: u64,
}

/// Execute the check command.
pub fn execute(args: CheckArgs, quiet: bool) -> Result<()> {
    let response: AuthenticationResponse = read_json(&args.response, "response")?;
    let challenge =
        codec::decode_url(&args.challenge).context("Failed to parse challenge (base64url)")?;
    let credential_id =
        CredentialId::from_base64url(&response.raw_id).context("Failed to parse rawId")?;

    let mut credential = Credential::new(
        credential_id,
        UserHandle::new(Vec::new()),
        args.public_key.trim().to_string(),
        args.algorithm,
        None,
        Utc::now(),
    );
    credential.sign_count = args.stored_count;

    let context = AssertionContext {
        challenge: &challenge,
        rp_id: &args.rp_id,
        origin: args.origin.as_deref(),
    };
    debug!(rp_id = %args.rp_id, origin = ?args.origin, "Checking assertion");

    let verified = AssertionValidator
        .validate(&credential, &response, &context)
        .context("Assertion rejected")?;

    if !quiet {
        println!("{}", "Assertion valid".green().bold());
        println!("   {} {}", "Credential ID:".dimmed(), verified.credential_id);
        println!(
            "   {} {} -> {}",
            "Sign count:".dimmed(),
            verified.previous_sign_count,
            verified.sign_count
        );
        if args.origin.is_none() {
            println!("   {} {}", "Origin:".dimmed(), "not checked".yellow());
        }
    }
    Ok(())
}
