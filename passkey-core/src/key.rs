//! Stored public key decoding and signature verification.
//!
//! The algorithm tag is resolved into [`KeyAlgorithm`] before any key bytes
//! are looked at, so an unknown COSE identifier never reaches a verifier.
//! Decoded keys are held as [`PublicKeyMaterial`], one variant per supported
//! algorithm, each backed by a vetted implementation (`ed25519-dalek`,
//! `p256`).

use p256::ecdsa::signature::Verifier;
use p256::pkcs8::DecodePublicKey;

use crate::codec;
use crate::error::{PasskeyError, Result};

/// SubjectPublicKeyInfo header for an Ed25519 key (RFC 8410): the 12 bytes
/// that precede the 32-byte point in DER form.
pub const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

pub const ED25519_PUBLIC_KEY_LEN: usize = 32;
pub const ED25519_SIGNATURE_LEN: usize = 64;

const P256_UNCOMPRESSED_POINT_LEN: usize = 65;
const P256_RAW_SIGNATURE_LEN: usize = 64;

/// Signature algorithms accepted for passkeys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    /// EdDSA over Curve25519, COSE `-8`.
    Ed25519,
    /// ECDSA over P-256 with SHA-256, COSE `-7`.
    EcdsaP256Sha256,
}

impl KeyAlgorithm {
    pub const COSE_EDDSA: i32 = -8;
    pub const COSE_ES256: i32 = -7;
    /// Historically advertised alongside ES256 by the login page; keys
    /// registered under it are verified on the P-256 path and must parse as
    /// P-256 keys.
    pub const COSE_LEGACY_SHA256: i32 = -257;

    /// Resolve a stored COSE identifier.
    pub fn from_cose(alg: i32) -> Result<Self> {
        match alg {
            Self::COSE_EDDSA => Ok(Self::Ed25519),
            Self::COSE_ES256 | Self::COSE_LEGACY_SHA256 => Ok(Self::EcdsaP256Sha256),
            other => Err(PasskeyError::key_format(format!(
                "unsupported COSE algorithm {other}"
            ))),
        }
    }

    /// Canonical COSE identifier.
    pub fn cose_id(self) -> i32 {
        match self {
            Self::Ed25519 => Self::COSE_EDDSA,
            Self::EcdsaP256Sha256 => Self::COSE_ES256,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ed25519 => "Ed25519",
            Self::EcdsaP256Sha256 => "ES256",
        }
    }
}

/// A decoded, ready-to-verify public key.
#[derive(Debug, Clone)]
pub enum PublicKeyMaterial {
    Ed25519(ed25519_dalek::VerifyingKey),
    EcdsaP256(p256::ecdsa::VerifyingKey),
}

impl PublicKeyMaterial {
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Ed25519(_) => KeyAlgorithm::Ed25519,
            Self::EcdsaP256(_) => KeyAlgorithm::EcdsaP256Sha256,
        }
    }

    /// Raw public key: the 32-byte Ed25519 point or the uncompressed SEC1
    /// P-256 point.
    pub fn raw_bytes(&self) -> Vec<u8> {
        match self {
            Self::Ed25519(key) => key.as_bytes().to_vec(),
            Self::EcdsaP256(key) => key.to_encoded_point(false).as_bytes().to_vec(),
        }
    }

    /// Verify `signature` over `message`.
    ///
    /// Ed25519 takes a 64-byte detached signature and is checked with strict
    /// verification (no small-order keys, canonical `S`). ECDSA takes the
    /// ASN.1 DER signature WebAuthn authenticators emit, or a raw `r || s`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        match self {
            Self::Ed25519(key) => {
                if signature.len() != ED25519_SIGNATURE_LEN {
                    return Err(PasskeyError::SignatureInvalid);
                }
                let signature = ed25519_dalek::Signature::from_slice(signature)
                    .map_err(|_| PasskeyError::SignatureInvalid)?;
                key.verify_strict(message, &signature)
                    .map_err(|_| PasskeyError::SignatureInvalid)
            }
            Self::EcdsaP256(key) => {
                let signature = parse_ecdsa_signature(signature)?;
                key.verify(message, &signature)
                    .map_err(|_| PasskeyError::SignatureInvalid)
            }
        }
    }
}

fn parse_ecdsa_signature(bytes: &[u8]) -> Result<p256::ecdsa::Signature> {
    if let Ok(signature) = p256::ecdsa::Signature::from_der(bytes) {
        return Ok(signature);
    }
    if bytes.len() == P256_RAW_SIGNATURE_LEN {
        return p256::ecdsa::Signature::from_slice(bytes)
            .map_err(|_| PasskeyError::SignatureInvalid);
    }
    Err(PasskeyError::SignatureInvalid)
}

/// Decode a stored public key for the given COSE algorithm.
///
/// The text is tried as standard base64, then base64url, then a PEM
/// `PUBLIC KEY` block. The resulting bytes must be a well-formed key for the
/// algorithm; wrong lengths, wrong curves and invalid points are rejected.
pub fn decode_stored_key(algorithm: i32, stored: &str) -> Result<PublicKeyMaterial> {
    let algorithm = KeyAlgorithm::from_cose(algorithm)?;
    let bytes = decode_key_text(stored)?;

    match algorithm {
        KeyAlgorithm::Ed25519 => ed25519_from_bytes(&bytes).map(PublicKeyMaterial::Ed25519),
        KeyAlgorithm::EcdsaP256Sha256 => p256_from_bytes(&bytes).map(PublicKeyMaterial::EcdsaP256),
    }
}

fn decode_key_text(stored: &str) -> Result<Vec<u8>> {
    codec::decode_standard(stored)
        .or_else(|_| codec::decode_url(stored))
        .or_else(|_| codec::decode_pem(stored))
        .map_err(|e| PasskeyError::key_format(format!("undecodable key text: {e}")))
}

fn ed25519_from_bytes(bytes: &[u8]) -> Result<ed25519_dalek::VerifyingKey> {
    let point = match bytes.len() {
        ED25519_PUBLIC_KEY_LEN => bytes,
        len if len == ED25519_SPKI_PREFIX.len() + ED25519_PUBLIC_KEY_LEN
            && bytes.starts_with(&ED25519_SPKI_PREFIX) =>
        {
            &bytes[ED25519_SPKI_PREFIX.len()..]
        }
        len => {
            return Err(PasskeyError::key_format(format!(
                "Ed25519 key must be 32 bytes, got {len}"
            )))
        }
    };

    let mut raw = [0u8; ED25519_PUBLIC_KEY_LEN];
    raw.copy_from_slice(point);
    ed25519_dalek::VerifyingKey::from_bytes(&raw)
        .map_err(|_| PasskeyError::key_format("Ed25519 key is not a valid curve point"))
}

fn p256_from_bytes(bytes: &[u8]) -> Result<p256::ecdsa::VerifyingKey> {
    if let Ok(public_key) = p256::PublicKey::from_public_key_der(bytes) {
        return Ok(p256::ecdsa::VerifyingKey::from(public_key));
    }

    if bytes.len() == P256_UNCOMPRESSED_POINT_LEN && bytes[0] == 0x04 {
        return p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|_| PasskeyError::key_format("P-256 point is not on the curve"));
    }

    Err(PasskeyError::key_format(
        "P-256 key must be SubjectPublicKeyInfo DER or an uncompressed point",
    ))
}
