#![no_main]

//! Fuzz target for AssertionValidator
//!
//! Feeds arbitrary JSON as a login response against a fixed credential.
//!
//! Run with: cargo +nightly fuzz run fuzz_assertion

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use passkey_core::{
    AssertionContext, AssertionValidator, AuthenticationResponse, Credential, CredentialId,
    SoftAuthenticator, UserHandle,
};

fn credential() -> &'static Credential {
    static CREDENTIAL: OnceLock<Credential> = OnceLock::new();
    CREDENTIAL.get_or_init(|| {
        let device = SoftAuthenticator::ed25519();
        Credential::new(
            CredentialId::new(device.credential_id().to_vec()),
            UserHandle::new(b"fuzz".to_vec()),
            device
                .public_key_text()
                .expect("public key should encode"),
            device.cose_algorithm(),
            None,
            chrono::Utc::now(),
        )
    })
}

fuzz_target!(|data: &[u8]| {
    let Ok(response) = serde_json::from_slice::<AuthenticationResponse>(data) else {
        return;
    };
    let context = AssertionContext {
        challenge: &[7u8; 32],
        rp_id: "example.test",
        origin: Some("https://example.test"),
    };
    let _ = AssertionValidator.validate(credential(), &response, &context);
});
