//! Passkey Core - WebAuthn ceremonies for a single-operator tool
//!
//! This crate implements the relying-party side of passkey registration and
//! authentication: challenge issuance, client data binding, authenticator
//! data checks, signature verification and sign-count bookkeeping. It has no
//! HTTP dependency; callers supply a [`ChallengeScope`] (usually the HTTP
//! session) and a [`CredentialStore`].
//!
//! # Features
//!
//! - Ed25519 and ECDSA P-256/SHA-256 credentials
//! - Single-use, per-ceremony challenges with constant-time comparison
//! - Compare-and-set sign counter commits
//! - Software authenticator for tests and tooling
//!
//! # Example
//!
//! ```no_run
//! use passkey_core::{
//!     authentication, registration, MemoryCredentialStore, MemoryScope, RelyingPartyConfig,
//!     SoftAuthenticator, SystemClock,
//! };
//!
//! # async fn example() -> passkey_core::Result<()> {
//! let store = MemoryCredentialStore::new();
//! let session = MemoryScope::new();
//! let config = RelyingPartyConfig::for_site("example.test");
//! let mut device = SoftAuthenticator::ed25519();
//!
//! let options = registration::begin(&store, &session, &config).await?;
//! let response = device.register(&options, "https://example.test")?;
//! registration::finish(&store, &session, &config, &response, &SystemClock).await?;
//!
//! let options = authentication::begin(&store, &session, &config).await?;
//! let response = device.assert(&options, "https://example.test");
//! let outcome = authentication::finish(&store, &session, &config, &response, &SystemClock).await?;
//! assert_eq!(outcome.credential.sign_count, 1);
//! # Ok(())
//! # }
//! ```

pub mod assertion;
pub mod authentication;
pub mod challenge;
pub mod client_data;
pub mod clock;
pub mod codec;
pub mod config;
pub mod credential;
pub mod error;
pub mod key;
pub mod protocol;
pub mod registration;
pub mod soft;
pub mod store;

// Re-export main types for convenience
pub use assertion::{next_sign_count, AssertionContext, AssertionValidator, VerifiedAssertion};
pub use authentication::{AuthenticatedCredential, COUNTER_COMMIT_ATTEMPTS};
pub use challenge::{CeremonyKind, Challenge, ChallengeScope, MemoryScope};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, RelyingPartyConfig};
pub use credential::{Credential, CredentialId, CredentialSummary, UserHandle};
pub use error::{PasskeyError, Result, StoreError};
pub use key::{decode_stored_key, KeyAlgorithm, PublicKeyMaterial};
pub use protocol::{
    AuthenticationResponse, CreationOptions, RegistrationResponse, RequestOptions,
};
pub use soft::{SoftAuthenticator, SoftAuthenticatorState};
pub use store::{CounterUpdate, CredentialStore, InsertOutcome, MemoryCredentialStore};

#[cfg(test)]
mod tests {
    use super::*;

    /// Integration test: register a key, then log in twice with it.
    #[tokio::test]
    async fn test_full_passkey_workflow() {
        let store = MemoryCredentialStore::new();
        let session = MemoryScope::new();
        let config = RelyingPartyConfig::for_site("example.test");
        let mut device = SoftAuthenticator::ed25519();

        let options = registration::begin(&store, &session, &config)
            .await
            .expect("Failed to begin registration");
        let response = device
            .register(&options, "https://example.test")
            .expect("Failed to build registration response");
        let credential = registration::finish(&store, &session, &config, &response, &SystemClock)
            .await
            .expect("Failed to register");
        assert_eq!(credential.sign_count, 0);

        for expected in 1..=2 {
            let options = authentication::begin(&store, &session, &config)
                .await
                .expect("Failed to begin authentication");
            let response = device.assert(&options, "https://example.test");
            let outcome =
                authentication::finish(&store, &session, &config, &response, &SystemClock)
                    .await
                    .expect("Authentication should succeed");
            assert_eq!(outcome.credential.sign_count, expected);
        }
    }

    /// A response produced for one session cannot be finished in another.
    #[tokio::test]
    async fn test_challenges_do_not_cross_sessions() {
        let store = MemoryCredentialStore::new();
        let config = RelyingPartyConfig::for_site("example.test");
        let mut device = SoftAuthenticator::p256();

        let alice = MemoryScope::new();
        let options = registration::begin(&store, &alice, &config).await.unwrap();
        let response = device.register(&options, "https://example.test").unwrap();

        let mallory = MemoryScope::new();
        assert!(matches!(
            registration::finish(&store, &mallory, &config, &response, &SystemClock).await,
            Err(PasskeyError::ChallengeExpired)
        ));
    }
}
