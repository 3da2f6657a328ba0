//! Exit codes following sysexits.h conventions.
//!
//! These codes let scripts tell a rejected passkey response apart from a
//! missing file or a failed write.

use passkey_core::PasskeyError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Data format error (rejected response, undecodable key).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Output file exists and `--force` was not given.
/// Maps to EX_CANTCREAT from sysexits.h.
pub const CANNOT_CREATE: i32 = 73;

/// I/O error (cannot write output file).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Ceremony and key errors anywhere in the chain are data errors
        let passkey_error = err.chain().find_map(|e| e.downcast_ref::<PasskeyError>());

        let code = match passkey_error {
            Some(e) if e.is_infrastructure() => GENERAL_ERROR,
            Some(_) => DATA_ERROR,
            None if message.starts_with("Failed to read") => INPUT_ERROR,
            None if message.starts_with("Failed to parse") => DATA_ERROR,
            None if message.starts_with("Refusing to overwrite") => CANNOT_CREATE,
            None if message.starts_with("Failed to write") => IO_ERROR,
            None => GENERAL_ERROR,
        };

        Self {
            code,
            message: Some(message),
        }
    }
}
