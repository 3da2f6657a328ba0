//! Software authenticator.
//!
//! Produces the same registration and assertion responses a browser would
//! relay from a platform authenticator, signed with an in-memory Ed25519 or
//! P-256 key. Used by tests and by the `passkey` CLI; it performs no user
//! presence checks and stores its secret in the clear.

use ciborium::Value;
use p256::ecdsa::signature::Signer;
use p256::pkcs8::EncodePublicKey;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::client_data::{TYPE_CREATE, TYPE_GET};
use crate::codec;
use crate::credential::PUBLIC_KEY_CREDENTIAL_TYPE;
use crate::error::{PasskeyError, Result};
use crate::key::KeyAlgorithm;
use crate::protocol::{
    AssertionPayload, AttestationPayload, AuthenticationResponse, CreationOptions,
    RegistrationResponse, RequestOptions,
};

/// User present + user verified.
const FLAGS_UP_UV: u8 = 0x05;

const CREDENTIAL_ID_LEN: usize = 16;

enum SigningKey {
    Ed25519(ed25519_dalek::SigningKey),
    P256(p256::ecdsa::SigningKey),
}

pub struct SoftAuthenticator {
    key: SigningKey,
    credential_id: Vec<u8>,
    sign_count: u32,
    user_handle: Option<Vec<u8>>,
}

impl std::fmt::Debug for SoftAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftAuthenticator")
            .field("algorithm", &self.algorithm())
            .field("credential_id", &codec::encode_url(&self.credential_id))
            .field("sign_count", &self.sign_count)
            .finish_non_exhaustive()
    }
}

/// Serializable authenticator state, as written by `passkey keygen`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftAuthenticatorState {
    pub algorithm: i32,
    /// base64url secret scalar / seed.
    pub secret_key: String,
    pub credential_id: String,
    pub sign_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<String>,
}

fn random_credential_id() -> Vec<u8> {
    let mut id = vec![0u8; CREDENTIAL_ID_LEN];
    OsRng.fill_bytes(&mut id);
    id
}

impl SoftAuthenticator {
    pub fn ed25519() -> Self {
        Self::with_key(SigningKey::Ed25519(ed25519_dalek::SigningKey::generate(
            &mut OsRng,
        )))
    }

    pub fn p256() -> Self {
        Self::with_key(SigningKey::P256(p256::ecdsa::SigningKey::random(&mut OsRng)))
    }

    /// Fresh key for the given COSE algorithm.
    pub fn generate(algorithm: KeyAlgorithm) -> Self {
        match algorithm {
            KeyAlgorithm::Ed25519 => Self::ed25519(),
            KeyAlgorithm::EcdsaP256Sha256 => Self::p256(),
        }
    }

    fn with_key(key: SigningKey) -> Self {
        Self {
            key,
            credential_id: random_credential_id(),
            sign_count: 0,
            user_handle: None,
        }
    }

    pub fn from_state(state: &SoftAuthenticatorState) -> Result<Self> {
        let secret = codec::decode_url(&state.secret_key)
            .map_err(|e| PasskeyError::key_format(format!("secret key: {e}")))?;

        let key = match KeyAlgorithm::from_cose(state.algorithm)? {
            KeyAlgorithm::Ed25519 => {
                let seed: [u8; 32] = secret
                    .as_slice()
                    .try_into()
                    .map_err(|_| PasskeyError::key_format("Ed25519 seed must be 32 bytes"))?;
                SigningKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(&seed))
            }
            KeyAlgorithm::EcdsaP256Sha256 => SigningKey::P256(
                p256::ecdsa::SigningKey::from_slice(&secret)
                    .map_err(|_| PasskeyError::key_format("invalid P-256 secret scalar"))?,
            ),
        };

        let credential_id = codec::decode_url(&state.credential_id)
            .map_err(|e| PasskeyError::malformed(format!("credential id: {e}")))?;
        let user_handle = match &state.user_handle {
            Some(handle) => Some(
                codec::decode_url(handle)
                    .map_err(|e| PasskeyError::malformed(format!("user handle: {e}")))?,
            ),
            None => None,
        };

        Ok(Self {
            key,
            credential_id,
            sign_count: state.sign_count,
            user_handle,
        })
    }

    pub fn to_state(&self) -> SoftAuthenticatorState {
        let secret = match &self.key {
            SigningKey::Ed25519(key) => key.to_bytes().to_vec(),
            SigningKey::P256(key) => key.to_bytes().to_vec(),
        };
        SoftAuthenticatorState {
            algorithm: self.cose_algorithm(),
            secret_key: codec::encode_url(&secret),
            credential_id: codec::encode_url(&self.credential_id),
            sign_count: self.sign_count,
            user_handle: self.user_handle.as_deref().map(codec::encode_url),
        }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self.key {
            SigningKey::Ed25519(_) => KeyAlgorithm::Ed25519,
            SigningKey::P256(_) => KeyAlgorithm::EcdsaP256Sha256,
        }
    }

    pub fn cose_algorithm(&self) -> i32 {
        self.algorithm().cose_id()
    }

    pub fn credential_id(&self) -> &[u8] {
        &self.credential_id
    }

    pub fn credential_id_text(&self) -> String {
        codec::encode_url(&self.credential_id)
    }

    pub fn sign_count(&self) -> u32 {
        self.sign_count
    }

    pub fn set_sign_count(&mut self, sign_count: u32) {
        self.sign_count = sign_count;
    }

    /// SubjectPublicKeyInfo DER of the public key.
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        let document = match &self.key {
            SigningKey::Ed25519(key) => key.verifying_key().to_public_key_der(),
            SigningKey::P256(key) => key.verifying_key().to_public_key_der(),
        }
        .map_err(|e| PasskeyError::key_format(format!("public key encoding: {e}")))?;
        Ok(document.into_vec())
    }

    /// Public key in the text form browsers submit at registration.
    pub fn public_key_text(&self) -> Result<String> {
        Ok(codec::encode_url(&self.public_key_der()?))
    }

    /// Ed25519: 64-byte signature. P-256: DER-encoded ECDSA signature.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        match &self.key {
            SigningKey::Ed25519(key) => {
                use ed25519_dalek::Signer as _;
                key.sign(message).to_bytes().to_vec()
            }
            SigningKey::P256(key) => {
                let signature: p256::ecdsa::Signature = key.sign(message);
                signature.to_der().as_bytes().to_vec()
            }
        }
    }

    /// `rpIdHash || flags || signCount` with no attested credential data.
    pub fn authenticator_data(rp_id: &str, sign_count: u32) -> Vec<u8> {
        let mut data = Sha256::digest(rp_id.as_bytes()).to_vec();
        data.push(FLAGS_UP_UV);
        data.extend_from_slice(&sign_count.to_be_bytes());
        data
    }

    pub fn client_data_json(ceremony_type: &str, challenge: &str, origin: &str) -> Vec<u8> {
        serde_json::json!({
            "type": ceremony_type,
            "challenge": challenge,
            "origin": origin,
            "crossOrigin": false,
        })
        .to_string()
        .into_bytes()
    }

    /// Answer creation options as a browser would for `origin`.
    pub fn register(
        &mut self,
        options: &CreationOptions,
        origin: &str,
    ) -> Result<RegistrationResponse> {
        self.user_handle = codec::decode_url(&options.user.id).ok();
        let client_data = Self::client_data_json(TYPE_CREATE, &options.challenge, origin);
        let auth_data = Self::authenticator_data(&options.rp.id, self.sign_count);
        let attestation_object = none_attestation_object(&auth_data)?;
        let public_key = self.public_key_text()?;
        let id = self.credential_id_text();

        Ok(RegistrationResponse {
            id: id.clone(),
            raw_id: id,
            credential_type: PUBLIC_KEY_CREDENTIAL_TYPE.to_string(),
            challenge: options.challenge.clone(),
            response: AttestationPayload {
                client_data_json: codec::encode_url(&client_data),
                attestation_object: codec::encode_url(&attestation_object),
                public_key,
                public_key_algorithm: Some(self.cose_algorithm()),
            },
            transports: Some(vec!["internal".to_string()]),
        })
    }

    /// Answer request options as a browser would for `origin`, bumping the
    /// counter first.
    pub fn assert(&mut self, options: &RequestOptions, origin: &str) -> AuthenticationResponse {
        self.sign_count = self.sign_count.saturating_add(1);
        let client_data = Self::client_data_json(TYPE_GET, &options.challenge, origin);
        let auth_data = Self::authenticator_data(&options.rp_id, self.sign_count);
        self.assertion_with(
            &options.challenge,
            &client_data,
            &auth_data,
            Some(u64::from(self.sign_count)),
        )
    }

    /// Sign arbitrary client data and authenticator data. Lets callers build
    /// responses that deviate from what a browser would send.
    pub fn assertion_with(
        &self,
        challenge: &str,
        client_data_json: &[u8],
        authenticator_data: &[u8],
        sign_count: Option<u64>,
    ) -> AuthenticationResponse {
        let mut message = authenticator_data.to_vec();
        message.extend_from_slice(&Sha256::digest(client_data_json));
        let signature = self.sign(&message);
        let id = self.credential_id_text();

        AuthenticationResponse {
            id: id.clone(),
            raw_id: id,
            credential_type: PUBLIC_KEY_CREDENTIAL_TYPE.to_string(),
            challenge: challenge.to_string(),
            sign_count,
            response: AssertionPayload {
                client_data_json: codec::encode_url(client_data_json),
                authenticator_data: codec::encode_url(authenticator_data),
                signature: codec::encode_url(&signature),
                user_handle: self.user_handle.as_deref().map(codec::encode_url),
            },
        }
    }
}

/// CBOR `{"fmt": "none", "attStmt": {}, "authData": <bytes>}`.
fn none_attestation_object(auth_data: &[u8]) -> Result<Vec<u8>> {
    let object = Value::Map(vec![
        (Value::Text("fmt".into()), Value::Text("none".into())),
        (Value::Text("attStmt".into()), Value::Map(Vec::new())),
        (Value::Text("authData".into()), Value::Bytes(auth_data.to_vec())),
    ]);

    let mut out = Vec::with_capacity(auth_data.len() + 32);
    ciborium::into_writer(&object, &mut out)
        .map_err(|e| PasskeyError::malformed(format!("attestation object: {e}")))?;
    Ok(out)
}
