//! Common utility functions shared across CLI commands.

use std::path::Path;

use anyhow::{bail, Context, Result};
use passkey_core::{SoftAuthenticator, SoftAuthenticatorState};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

/// Read and parse a JSON document, naming `what` in errors.
pub fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read {what} file: {}", path.display()))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read {what}");

    serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse {what} file: {}", path.display()))
}

/// Pretty-print `value` to `output`, or to stdout when no path is given.
pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to write JSON")?;
    match output {
        Some(path) => std::fs::write(path, format!("{text}\n"))
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

/// Load a software authenticator written by `passkey keygen`.
pub fn load_authenticator(path: &Path) -> Result<SoftAuthenticator> {
    let state: SoftAuthenticatorState = read_json(path, "key")?;
    SoftAuthenticator::from_state(&state)
        .with_context(|| format!("Invalid key file: {}", path.display()))
}

/// Persist authenticator state, e.g. after the counter moved.
pub fn save_authenticator(device: &SoftAuthenticator, path: &Path) -> Result<()> {
    write_json(&device.to_state(), Some(path))
}

/// Refuse to clobber an existing file unless forced.
pub fn ensure_writable(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Refusing to overwrite {} (use --force to replace it)",
            path.display()
        );
    }
    Ok(())
}
