//! Registration ceremony.
//!
//! `begin` hands the browser creation options bound to a fresh challenge;
//! `finish` checks the browser's answer against that challenge and persists
//! the new credential. Attestation is accepted as opaque (`"none"`).

use crate::challenge::{self, CeremonyKind, ChallengeScope};
use crate::client_data::{ClientData, TYPE_CREATE};
use crate::clock::Clock;
use crate::codec;
use crate::config::RelyingPartyConfig;
use crate::credential::{
    normalize_transports, Credential, CredentialId, ATTESTATION_NONE, PUBLIC_KEY_CREDENTIAL_TYPE,
};
use crate::error::{PasskeyError, Result};
use crate::key::{decode_stored_key, KeyAlgorithm};
use crate::protocol::{
    CreationOptions, CredentialDescriptor, CredentialParameter, RegistrationResponse,
    RelyingPartyEntity, UserEntity,
};
use crate::store::{CredentialStore, InsertOutcome};

/// Algorithms advertised in `pubKeyCredParams`, in preference order.
pub const ADVERTISED_ALGORITHMS: [i32; 2] = [KeyAlgorithm::COSE_ES256, KeyAlgorithm::COSE_EDDSA];

pub async fn begin(
    store: &dyn CredentialStore,
    scope: &dyn ChallengeScope,
    config: &RelyingPartyConfig,
) -> Result<CreationOptions> {
    let existing = store.list_for_user(&config.user_handle).await?;
    let challenge = challenge::issue(scope, CeremonyKind::Registration).await?;

    Ok(CreationOptions {
        challenge: challenge.to_base64url(),
        rp: RelyingPartyEntity {
            id: config.rp_id.clone(),
            name: config.rp_name.clone(),
        },
        user: UserEntity {
            id: config.user_handle.to_base64url(),
            name: config.user_name.clone(),
            display_name: config.user_display_name.clone(),
        },
        pub_key_cred_params: ADVERTISED_ALGORITHMS
            .iter()
            .map(|&alg| CredentialParameter::public_key(alg))
            .collect(),
        timeout: config.timeout_ms,
        attestation: ATTESTATION_NONE.to_string(),
        exclude_credentials: existing.iter().map(CredentialDescriptor::exclude).collect(),
    })
}

/// Decode `id` and `rawId` and require them to name the same credential.
pub(crate) fn credential_id_of(id: &str, raw_id: &str, credential_type: &str) -> Result<CredentialId> {
    if credential_type != PUBLIC_KEY_CREDENTIAL_TYPE {
        return Err(PasskeyError::malformed(format!(
            "credential type {credential_type:?} is not \"public-key\""
        )));
    }
    let raw = codec::decode_url(raw_id).map_err(|e| PasskeyError::malformed(format!("rawId: {e}")))?;
    let id = codec::decode_url(id).map_err(|e| PasskeyError::malformed(format!("id: {e}")))?;
    if id != raw {
        return Err(PasskeyError::malformed("id and rawId differ"));
    }
    Ok(CredentialId::new(raw))
}

/// Compare the challenge echoed at the top level of a response.
pub(crate) fn check_echoed_challenge(echoed: &str, expected: &challenge::Challenge) -> Result<()> {
    let presented = codec::decode_url(echoed).map_err(|_| PasskeyError::ChallengeMismatch)?;
    if expected.matches(&presented) {
        Ok(())
    } else {
        Err(PasskeyError::ChallengeMismatch)
    }
}

pub async fn finish(
    store: &dyn CredentialStore,
    scope: &dyn ChallengeScope,
    config: &RelyingPartyConfig,
    response: &RegistrationResponse,
    clock: &dyn Clock,
) -> Result<Credential> {
    let expected = challenge::consume(scope, CeremonyKind::Registration)
        .await?
        .ok_or(PasskeyError::ChallengeExpired)?;

    let credential_id =
        credential_id_of(&response.id, &response.raw_id, &response.credential_type)?;
    check_echoed_challenge(&response.challenge, &expected)?;

    let payload = &response.response;
    let client_data_raw = codec::decode_url(&payload.client_data_json)
        .map_err(|e| PasskeyError::malformed(format!("clientDataJSON: {e}")))?;
    let client_data = ClientData::parse(client_data_raw)?;
    client_data.check_challenge(expected.as_bytes())?;
    client_data.check_origin(config.expected_origin())?;
    client_data.check_type(TYPE_CREATE)?;

    codec::decode_url(&payload.attestation_object)
        .map_err(|e| PasskeyError::malformed(format!("attestationObject: {e}")))?;

    if store.find(&credential_id).await?.is_some() {
        tracing::info!(credential_id = %credential_id, "Rejected duplicate passkey registration");
        return Err(PasskeyError::DuplicateCredential);
    }

    let algorithm = payload
        .public_key_algorithm
        .ok_or_else(|| PasskeyError::malformed("publicKeyAlgorithm missing"))?;
    let key = decode_stored_key(algorithm, &payload.public_key)?;

    // the user handle always comes from configuration; there is one operator
    let credential = Credential::new(
        credential_id,
        config.user_handle.clone(),
        payload.public_key.clone(),
        algorithm,
        normalize_transports(response.transports.as_deref()),
        clock.now(),
    );

    match store.insert(&credential).await? {
        InsertOutcome::Inserted => {}
        InsertOutcome::Duplicate => return Err(PasskeyError::DuplicateCredential),
    }

    tracing::info!(
        credential_id = %credential.credential_id,
        algorithm = key.algorithm().as_str(),
        "Registered passkey"
    );

    Ok(credential)
}
