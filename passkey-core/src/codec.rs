//! Text encodings used on the wire and in stored key material.
//!
//! WebAuthn clients send binary fields as unpadded base64url, but stored keys
//! arrive in whatever shape the registering client produced: standard base64,
//! base64url (padded or not) or a PEM `PUBLIC KEY` block. Decoding is
//! padding-indifferent everywhere; encoding always produces unpadded
//! base64url.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use p256::pkcs8::der::pem;

const PEM_LABEL: &str = "PUBLIC KEY";

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Codec failures. Callers map these onto the ceremony error that fits the
/// field being decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("empty input")]
    Empty,

    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    #[error("not a PEM public key")]
    NotPem,

    #[error("invalid PEM: {0}")]
    InvalidPem(String),
}

/// Encode bytes as unpadded base64url.
pub fn encode_url(bytes: &[u8]) -> String {
    URL_SAFE_LENIENT.encode(bytes)
}

/// Decode base64url text, accepting missing or present padding.
///
/// Characters from the standard alphabet (`+`, `/`) are folded onto their
/// URL-safe counterparts first, so clients that forgot to translate still
/// decode to the same bytes. Empty input and empty output are rejected.
pub fn decode_url(text: &str) -> Result<Vec<u8>, CodecError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CodecError::Empty);
    }

    let normalized: String = trimmed
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();

    let decoded = URL_SAFE_LENIENT
        .decode(normalized.as_bytes())
        .map_err(|e| CodecError::InvalidBase64(e.to_string()))?;

    if decoded.is_empty() {
        return Err(CodecError::Empty);
    }
    Ok(decoded)
}

/// Decode standard-alphabet base64, padding optional.
pub fn decode_standard(text: &str) -> Result<Vec<u8>, CodecError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CodecError::Empty);
    }

    let decoded = STANDARD_LENIENT
        .decode(trimmed.as_bytes())
        .map_err(|e| CodecError::InvalidBase64(e.to_string()))?;

    if decoded.is_empty() {
        return Err(CodecError::Empty);
    }
    Ok(decoded)
}

/// Unwrap a PEM `PUBLIC KEY` block into its DER bytes.
pub fn decode_pem(text: &str) -> Result<Vec<u8>, CodecError> {
    let block = format!("{}\n", text.trim());
    let (label, der) = pem::decode_vec(block.as_bytes())
        .map_err(|e| CodecError::InvalidPem(e.to_string()))?;
    if label != PEM_LABEL {
        return Err(CodecError::NotPem);
    }
    if der.is_empty() {
        return Err(CodecError::Empty);
    }
    Ok(der)
}
