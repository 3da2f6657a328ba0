//! Assertion verification.
//!
//! [`AssertionValidator::validate`] runs a fixed sequence of checks against
//! one stored credential and stops at the first failure:
//!
//! 1. decode `clientDataJSON`, `authenticatorData` and `signature`
//! 2. parse client data as a JSON object
//! 3. client data challenge equals the expected challenge
//! 4. client data origin equals the configured origin, when one is set
//! 5. client data type is `webauthn.get`
//! 6. authenticator data starts with SHA-256 of the RP id
//! 7. signature over `authenticatorData || SHA-256(clientDataJSON)`
//! 8. sign counter policy
//!
//! The validator never writes. It returns the counter the caller should
//! commit.

use sha2::{Digest, Sha256};

use crate::client_data::{constant_time_eq, ClientData, TYPE_GET};
use crate::codec;
use crate::credential::{Credential, CredentialId};
use crate::error::{PasskeyError, Result};
use crate::key::decode_stored_key;
use crate::protocol::{AssertionPayload, AuthenticationResponse};

const RP_ID_HASH_LEN: usize = 32;

/// Authenticators keep a 32-bit signature counter.
pub const MAX_SIGN_COUNT: u64 = u32::MAX as u64;

/// Inputs that come from the server side of the ceremony.
#[derive(Debug, Clone, Copy)]
pub struct AssertionContext<'a> {
    pub challenge: &'a [u8],
    pub rp_id: &'a str,
    /// `None` skips the origin check.
    pub origin: Option<&'a str>,
}

/// A verified assertion and the counter to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAssertion {
    pub credential_id: CredentialId,
    pub previous_sign_count: u64,
    pub sign_count: u64,
}

/// Decide the counter to store after a verified assertion.
///
/// A presented counter below `stored` is a regression. An equal counter is
/// accepted, as authenticators that do not implement counters always send
/// zero. An absent counter advances the stored value by one. A presented
/// counter wider than 32 bits is malformed.
pub fn next_sign_count(stored: u64, presented: Option<u64>) -> Result<u64> {
    match presented {
        Some(presented) if presented > MAX_SIGN_COUNT => Err(PasskeyError::malformed(format!(
            "signCount {presented} exceeds the 32-bit authenticator counter"
        ))),
        Some(presented) if presented < stored => {
            Err(PasskeyError::CounterRegression { stored, presented })
        }
        Some(presented) => Ok(presented),
        None => Ok(stored.saturating_add(1)),
    }
}

fn rejected(step: &'static str, err: PasskeyError) -> PasskeyError {
    tracing::debug!(step, code = err.code(), "Assertion rejected");
    err
}

fn decode_field(name: &'static str, text: &str) -> Result<Vec<u8>> {
    codec::decode_url(text).map_err(|e| PasskeyError::malformed(format!("{name}: {e}")))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AssertionValidator;

impl AssertionValidator {
    pub fn validate(
        &self,
        credential: &Credential,
        response: &AuthenticationResponse,
        context: &AssertionContext<'_>,
    ) -> Result<VerifiedAssertion> {
        let payload = &response.response;

        let (client_data_raw, authenticator_data, signature) =
            decode_payload(payload).map_err(|e| rejected("decode", e))?;

        let client_data = ClientData::parse(client_data_raw).map_err(|e| rejected("client_data", e))?;

        client_data
            .check_challenge(context.challenge)
            .map_err(|e| rejected("challenge", e))?;

        client_data
            .check_origin(context.origin)
            .map_err(|e| rejected("origin", e))?;

        client_data
            .check_type(TYPE_GET)
            .map_err(|e| rejected("type", e))?;

        check_rp_id_hash(&authenticator_data, context.rp_id).map_err(|e| rejected("rp_id", e))?;

        let key = decode_stored_key(credential.algorithm, &credential.public_key)
            .map_err(|e| rejected("public_key", e))?;

        let mut message = authenticator_data;
        message.extend_from_slice(&client_data.hash());
        key.verify(&message, &signature)
            .map_err(|e| rejected("signature", e))?;

        let sign_count = next_sign_count(credential.sign_count, response.sign_count)
            .map_err(|e| rejected("sign_count", e))?;

        tracing::debug!(
            credential_id = %credential.credential_id,
            algorithm = key.algorithm().as_str(),
            sign_count,
            "Assertion verified"
        );

        Ok(VerifiedAssertion {
            credential_id: credential.credential_id.clone(),
            previous_sign_count: credential.sign_count,
            sign_count,
        })
    }
}

fn decode_payload(payload: &AssertionPayload) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>)> {
    Ok((
        decode_field("clientDataJSON", &payload.client_data_json)?,
        decode_field("authenticatorData", &payload.authenticator_data)?,
        decode_field("signature", &payload.signature)?,
    ))
}

fn check_rp_id_hash(authenticator_data: &[u8], rp_id: &str) -> Result<()> {
    let Some(presented) = authenticator_data.get(..RP_ID_HASH_LEN) else {
        return Err(PasskeyError::malformed(
            "authenticator data shorter than the RP id hash",
        ));
    };
    let expected = Sha256::digest(rp_id.as_bytes());
    if constant_time_eq(presented, expected.as_slice()) {
        Ok(())
    } else {
        Err(PasskeyError::RelyingPartyMismatch)
    }
}
