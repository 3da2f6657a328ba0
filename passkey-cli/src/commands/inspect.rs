//! Inspect command implementation.
//!
//! Decodes a stored public key the way the server does at login time.

use anyhow::{Context, Result};
use colored::Colorize;
use passkey_core::decode_stored_key;
use serde_json::json;

/// Execute the inspect command.
pub fn execute(algorithm: i32, public_key: String, json_output: bool) -> Result<()> {
    let key = decode_stored_key(algorithm, public_key.trim())
        .context("Stored public key cannot be used for verification")?;
    let resolved = key.algorithm();
    let raw = hex::encode(key.raw_bytes());

    if json_output {
        let report = json!({
            "valid": true,
            "algorithm": resolved.as_str(),
            "coseAlgorithm": resolved.cose_id(),
            "requestedAlgorithm": algorithm,
            "rawPublicKey": raw,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Public key is usable".green().bold());
    println!("   {} {}", "Algorithm:".dimmed(), resolved.as_str());
    println!("   {} {}", "COSE id:".dimmed(), resolved.cose_id());
    println!("   {} {}", "Raw key:".dimmed(), raw);
    if resolved.cose_id() != algorithm {
        println!(
            "   {} {} is accepted as an alias",
            "Note:".yellow(),
            algorithm
        );
    }
    Ok(())
}
