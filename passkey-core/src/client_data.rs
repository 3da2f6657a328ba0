//! Collected client data (`clientDataJSON`) checks shared by both ceremonies.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::codec;
use crate::error::{PasskeyError, Result};

pub const TYPE_CREATE: &str = "webauthn.create";
pub const TYPE_GET: &str = "webauthn.get";

/// Byte equality that does not short-circuit on the first differing byte.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Only trailing slashes are dropped; any other difference is a mismatch.
pub(crate) fn normalize_origin(origin: &str) -> &str {
    origin.trim_end_matches('/')
}

/// Parsed client data, keeping the raw bytes for hashing.
#[derive(Debug, Clone)]
pub struct ClientData {
    raw: Vec<u8>,
    fields: Map<String, Value>,
}

impl ClientData {
    /// Parse the decoded JSON. Anything other than a JSON object is malformed.
    pub fn parse(raw: Vec<u8>) -> Result<Self> {
        let value: Value = serde_json::from_slice(&raw)
            .map_err(|e| PasskeyError::malformed(format!("client data is not JSON: {e}")))?;
        match value {
            Value::Object(fields) => Ok(Self { raw, fields }),
            _ => Err(PasskeyError::malformed("client data is not a JSON object")),
        }
    }

    fn string_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn challenge(&self) -> Option<&str> {
        self.string_field("challenge")
    }

    pub fn origin(&self) -> Option<&str> {
        self.string_field("origin")
    }

    pub fn ceremony_type(&self) -> Option<&str> {
        self.string_field("type")
    }

    /// SHA-256 over the exact bytes the client sent.
    pub fn hash(&self) -> [u8; 32] {
        Sha256::digest(&self.raw).into()
    }

    pub fn check_challenge(&self, expected: &[u8]) -> Result<()> {
        let presented = self
            .challenge()
            .and_then(|text| codec::decode_url(text).ok())
            .ok_or(PasskeyError::ChallengeMismatch)?;

        if constant_time_eq(&presented, expected) {
            Ok(())
        } else {
            Err(PasskeyError::ChallengeMismatch)
        }
    }

    /// Compare origins after stripping trailing slashes. `None` skips the
    /// check entirely.
    pub fn check_origin(&self, expected: Option<&str>) -> Result<()> {
        let Some(expected) = expected else {
            return Ok(());
        };
        let presented = self.origin().ok_or(PasskeyError::OriginMismatch)?;

        if constant_time_eq(
            normalize_origin(presented).as_bytes(),
            normalize_origin(expected).as_bytes(),
        ) {
            Ok(())
        } else {
            Err(PasskeyError::OriginMismatch)
        }
    }

    pub fn check_type(&self, expected: &str) -> Result<()> {
        let presented = self.ceremony_type().unwrap_or_default();
        if constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
            Ok(())
        } else {
            Err(PasskeyError::UnsupportedCeremonyType(presented.to_string()))
        }
    }
}
