//! Authentication ceremony.
//!
//! Wraps the [`AssertionValidator`] with everything that needs the store:
//! challenge consumption, credential lookup, user handle binding and the
//! compare-and-set commit of the new counter.

use crate::assertion::{next_sign_count, AssertionContext, AssertionValidator};
use crate::challenge::{self, CeremonyKind, ChallengeScope};
use crate::client_data::constant_time_eq;
use crate::clock::Clock;
use crate::codec;
use crate::config::RelyingPartyConfig;
use crate::credential::Credential;
use crate::error::{PasskeyError, Result, StoreError};
use crate::protocol::{AuthenticationResponse, CredentialDescriptor, RequestOptions};
use crate::registration::{check_echoed_challenge, credential_id_of};
use crate::store::{CounterUpdate, CredentialStore};

/// Compare-and-set attempts before giving up on a contended counter.
pub const COUNTER_COMMIT_ATTEMPTS: u32 = 3;

const USER_VERIFICATION_PREFERRED: &str = "preferred";

/// A successful authentication: the credential as committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedCredential {
    pub credential: Credential,
    pub previous_sign_count: u64,
}

pub async fn begin(
    store: &dyn CredentialStore,
    scope: &dyn ChallengeScope,
    config: &RelyingPartyConfig,
) -> Result<RequestOptions> {
    let credentials = store.list_for_user(&config.user_handle).await?;
    let challenge = challenge::issue(scope, CeremonyKind::Authentication).await?;

    Ok(RequestOptions {
        challenge: challenge.to_base64url(),
        rp_id: config.rp_id.clone(),
        timeout: config.timeout_ms,
        allow_credentials: credentials.iter().map(CredentialDescriptor::allow).collect(),
        user_verification: USER_VERIFICATION_PREFERRED.to_string(),
    })
}

fn check_user_handle(
    response: &AuthenticationResponse,
    credential: &Credential,
    config: &RelyingPartyConfig,
) -> Result<()> {
    let presented = match response.response.user_handle.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => {
            codec::decode_url(text).map_err(|_| PasskeyError::UserHandleMismatch)?
        }
        _ => config.user_handle.as_bytes().to_vec(),
    };

    if constant_time_eq(&presented, credential.user_handle.as_bytes()) {
        Ok(())
    } else {
        Err(PasskeyError::UserHandleMismatch)
    }
}

pub async fn finish(
    store: &dyn CredentialStore,
    scope: &dyn ChallengeScope,
    config: &RelyingPartyConfig,
    response: &AuthenticationResponse,
    clock: &dyn Clock,
) -> Result<AuthenticatedCredential> {
    let expected = challenge::consume(scope, CeremonyKind::Authentication)
        .await?
        .ok_or(PasskeyError::ChallengeExpired)?;

    let credential_id =
        credential_id_of(&response.id, &response.raw_id, &response.credential_type)?;
    check_echoed_challenge(&response.challenge, &expected)?;

    let mut credential = store
        .find(&credential_id)
        .await?
        .ok_or(PasskeyError::CredentialNotFound)?;

    check_user_handle(response, &credential, config)?;

    let context = AssertionContext {
        challenge: expected.as_bytes(),
        rp_id: &config.rp_id,
        origin: config.expected_origin(),
    };
    let verified = AssertionValidator.validate(&credential, response, &context)?;

    let used_at = clock.now();
    let mut observed = credential.sign_count;
    let mut next = verified.sign_count;

    for attempt in 1..=COUNTER_COMMIT_ATTEMPTS {
        match store
            .compare_and_set_counter(&credential_id, observed, next, used_at)
            .await?
        {
            CounterUpdate::Committed => {
                credential.sign_count = next;
                credential.last_used_at = Some(used_at);
                tracing::info!(
                    credential_id = %credential_id,
                    sign_count = next,
                    "Passkey authentication succeeded"
                );
                return Ok(AuthenticatedCredential {
                    credential,
                    previous_sign_count: observed,
                });
            }
            CounterUpdate::Stale => {
                let fresh = store
                    .find(&credential_id)
                    .await?
                    .ok_or(PasskeyError::CredentialNotFound)?;
                tracing::debug!(
                    credential_id = %credential_id,
                    attempt,
                    observed,
                    current = fresh.sign_count,
                    "Sign count changed concurrently, re-checking"
                );
                observed = fresh.sign_count;
                next = next_sign_count(observed, response.sign_count)?;
            }
            CounterUpdate::NotFound => return Err(PasskeyError::CredentialNotFound),
        }
    }

    tracing::warn!(credential_id = %credential_id, "Gave up committing sign count");
    Err(StoreError::CounterConflict {
        attempts: COUNTER_COMMIT_ATTEMPTS,
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::MemoryScope;
    use crate::client_data::TYPE_GET;
    use crate::clock::{FixedClock, SystemClock};
    use crate::credential::{CredentialId, UserHandle};
    use crate::registration;
    use crate::soft::SoftAuthenticator;
    use crate::store::{InsertOutcome, MemoryCredentialStore};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::atomic::{AtomicU32, Ordering};

    const ORIGIN: &str = "https://example.test";

    struct Harness {
        store: MemoryCredentialStore,
        scope: MemoryScope,
        config: RelyingPartyConfig,
        soft: SoftAuthenticator,
    }

    impl Harness {
        async fn registered(soft: SoftAuthenticator) -> Self {
            let mut harness = Self {
                store: MemoryCredentialStore::new(),
                scope: MemoryScope::new(),
                config: RelyingPartyConfig::for_site("example.test"),
                soft,
            };
            let options = registration::begin(&harness.store, &harness.scope, &harness.config)
                .await
                .unwrap();
            let response = harness.soft.register(&options, ORIGIN).unwrap();
            registration::finish(
                &harness.store,
                &harness.scope,
                &harness.config,
                &response,
                &SystemClock,
            )
            .await
            .unwrap();
            harness
        }

        async fn options(&self) -> RequestOptions {
            begin(&self.store, &self.scope, &self.config).await.unwrap()
        }

        async fn finish(&self, response: &AuthenticationResponse) -> Result<AuthenticatedCredential> {
            finish(&self.store, &self.scope, &self.config, response, &SystemClock).await
        }

        async fn stored_count(&self) -> u64 {
            let id = CredentialId::new(self.soft.credential_id().to_vec());
            self.store.find(&id).await.unwrap().unwrap().sign_count
        }

        fn signed(&self, options: &RequestOptions, sign_count: Option<u64>) -> AuthenticationResponse {
            let client_data =
                SoftAuthenticator::client_data_json(TYPE_GET, &options.challenge, ORIGIN);
            let auth_data = SoftAuthenticator::authenticator_data(&options.rp_id, 0);
            self.soft
                .assertion_with(&options.challenge, &client_data, &auth_data, sign_count)
        }
    }

    #[tokio::test]
    async fn test_begin_lists_allowed_credentials() {
        let harness = Harness::registered(SoftAuthenticator::ed25519()).await;
        let options = harness.options().await;
        assert_eq!(options.rp_id, "example.test");
        assert_eq!(options.user_verification, "preferred");
        assert_eq!(options.allow_credentials.len(), 1);
        assert_eq!(options.allow_credentials[0].id, harness.soft.credential_id_text());
        assert_eq!(
            options.allow_credentials[0].transports,
            Some(vec!["internal".to_string()])
        );
    }

    #[tokio::test]
    async fn test_ed25519_sign_count_ten() {
        let harness = Harness::registered(SoftAuthenticator::ed25519()).await;
        let options = harness.options().await;
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap());

        let outcome = finish(
            &harness.store,
            &harness.scope,
            &harness.config,
            &harness.signed(&options, Some(10)),
            &clock,
        )
        .await
        .unwrap();

        assert_eq!(outcome.credential.sign_count, 10);
        assert_eq!(outcome.previous_sign_count, 0);
        assert_eq!(outcome.credential.last_used_at, Some(clock.0));
        assert_eq!(harness.stored_count().await, 10);
    }

    #[tokio::test]
    async fn test_p256_login_flow() {
        let mut harness = Harness::registered(SoftAuthenticator::p256()).await;
        for expected in 1..=3u64 {
            let options = harness.options().await;
            let response = harness.soft.assert(&options, ORIGIN);
            let outcome = harness.finish(&response).await.unwrap();
            assert_eq!(outcome.credential.sign_count, expected);
        }
    }

    #[tokio::test]
    async fn test_absent_counter_advances_by_one() {
        let harness = Harness::registered(SoftAuthenticator::ed25519()).await;
        for expected in 1..=2u64 {
            let options = harness.options().await;
            harness.finish(&harness.signed(&options, None)).await.unwrap();
            assert_eq!(harness.stored_count().await, expected);
        }
    }

    #[tokio::test]
    async fn test_regression_leaves_counter_unchanged() {
        let harness = Harness::registered(SoftAuthenticator::ed25519()).await;
        let options = harness.options().await;
        harness.finish(&harness.signed(&options, Some(10))).await.unwrap();

        let options = harness.options().await;
        assert!(matches!(
            harness.finish(&harness.signed(&options, Some(9))).await,
            Err(PasskeyError::CounterRegression {
                stored: 10,
                presented: 9
            })
        ));
        assert_eq!(harness.stored_count().await, 10);
    }

    #[tokio::test]
    async fn test_tampered_signature_leaves_counter_unchanged() {
        let harness = Harness::registered(SoftAuthenticator::ed25519()).await;
        let options = harness.options().await;
        let mut response = harness.signed(&options, Some(10));
        let mut signature = codec::decode_url(&response.response.signature).unwrap();
        signature[0] ^= 0x80;
        response.response.signature = codec::encode_url(&signature);

        assert!(matches!(
            harness.finish(&response).await,
            Err(PasskeyError::SignatureInvalid)
        ));
        assert_eq!(harness.stored_count().await, 0);
    }

    #[tokio::test]
    async fn test_challenge_is_consumed_even_on_failure() {
        let harness = Harness::registered(SoftAuthenticator::ed25519()).await;
        let options = harness.options().await;
        let mut bad = harness.signed(&options, Some(1));
        bad.response.signature = codec::encode_url(&[0u8; 64]);
        assert!(harness.finish(&bad).await.is_err());

        let good = harness.signed(&options, Some(1));
        assert!(matches!(
            harness.finish(&good).await,
            Err(PasskeyError::ChallengeExpired)
        ));
    }

    #[tokio::test]
    async fn test_replayed_response_after_new_challenge_mismatches() {
        let harness = Harness::registered(SoftAuthenticator::ed25519()).await;
        let options = harness.options().await;
        let response = harness.signed(&options, Some(1));
        harness.finish(&response).await.unwrap();

        harness.options().await;
        assert!(matches!(
            harness.finish(&response).await,
            Err(PasskeyError::ChallengeMismatch)
        ));
    }

    #[tokio::test]
    async fn test_unknown_credential() {
        let harness = Harness::registered(SoftAuthenticator::ed25519()).await;
        let options = harness.options().await;
        let stranger = SoftAuthenticator::ed25519();
        let client_data = SoftAuthenticator::client_data_json(TYPE_GET, &options.challenge, ORIGIN);
        let auth_data = SoftAuthenticator::authenticator_data("example.test", 1);
        let response = stranger.assertion_with(&options.challenge, &client_data, &auth_data, Some(1));

        assert!(matches!(
            harness.finish(&response).await,
            Err(PasskeyError::CredentialNotFound)
        ));
    }

    #[tokio::test]
    async fn test_user_handle_mismatch() {
        let harness = Harness::registered(SoftAuthenticator::ed25519()).await;
        let options = harness.options().await;
        let mut response = harness.signed(&options, Some(1));
        response.response.user_handle = Some(codec::encode_url(b"someone-else"));

        assert!(matches!(
            harness.finish(&response).await,
            Err(PasskeyError::UserHandleMismatch)
        ));
    }

    #[tokio::test]
    async fn test_missing_user_handle_falls_back_to_configured() {
        let harness = Harness::registered(SoftAuthenticator::ed25519()).await;
        let options = harness.options().await;
        let mut response = harness.signed(&options, Some(1));
        response.response.user_handle = Some(String::new());
        assert!(harness.finish(&response).await.is_ok());
    }

    /// Store whose first `stale_rounds` counter updates report a concurrent
    /// writer that moved the counter to `bumped_to`.
    struct RacingStore {
        inner: MemoryCredentialStore,
        stale_rounds: AtomicU32,
        bumped_to: u64,
    }

    #[async_trait]
    impl CredentialStore for RacingStore {
        async fn find(&self, id: &CredentialId) -> std::result::Result<Option<Credential>, StoreError> {
            self.inner.find(id).await
        }

        async fn list_for_user(
            &self,
            user_handle: &UserHandle,
        ) -> std::result::Result<Vec<Credential>, StoreError> {
            self.inner.list_for_user(user_handle).await
        }

        async fn insert(&self, credential: &Credential) -> std::result::Result<InsertOutcome, StoreError> {
            self.inner.insert(credential).await
        }

        async fn compare_and_set_counter(
            &self,
            id: &CredentialId,
            expected: u64,
            new_count: u64,
            used_at: DateTime<Utc>,
        ) -> std::result::Result<CounterUpdate, StoreError> {
            if self.stale_rounds.load(Ordering::SeqCst) > 0 {
                self.stale_rounds.fetch_sub(1, Ordering::SeqCst);
                let current = self.inner.find(id).await?.map(|c| c.sign_count).unwrap_or(0);
                self.inner
                    .compare_and_set_counter(id, current, self.bumped_to, used_at)
                    .await?;
                return Ok(CounterUpdate::Stale);
            }
            self.inner
                .compare_and_set_counter(id, expected, new_count, used_at)
                .await
        }

        async fn count(&self) -> std::result::Result<u64, StoreError> {
            self.inner.count().await
        }
    }

    async fn racing_harness(stale_rounds: u32, bumped_to: u64) -> (RacingStore, Harness) {
        let harness = Harness::registered(SoftAuthenticator::ed25519()).await;
        let racing = RacingStore {
            inner: MemoryCredentialStore::new(),
            stale_rounds: AtomicU32::new(stale_rounds),
            bumped_to,
        };
        let id = CredentialId::new(harness.soft.credential_id().to_vec());
        let credential = harness.store.find(&id).await.unwrap().unwrap();
        racing.inner.insert(&credential).await.unwrap();
        (racing, harness)
    }

    #[tokio::test]
    async fn test_concurrent_commit_with_higher_counter_wins() {
        let (racing, harness) = racing_harness(1, 5).await;
        let options = begin(&racing, &harness.scope, &harness.config).await.unwrap();

        let outcome = finish(
            &racing,
            &harness.scope,
            &harness.config,
            &harness.signed(&options, Some(10)),
            &SystemClock,
        )
        .await
        .unwrap();
        assert_eq!(outcome.credential.sign_count, 10);
        assert_eq!(outcome.previous_sign_count, 5);
    }

    #[tokio::test]
    async fn test_later_counter_never_overwritten_by_earlier() {
        let (racing, harness) = racing_harness(1, 12).await;
        let options = begin(&racing, &harness.scope, &harness.config).await.unwrap();

        let result = finish(
            &racing,
            &harness.scope,
            &harness.config,
            &harness.signed(&options, Some(10)),
            &SystemClock,
        )
        .await;
        assert!(matches!(
            result,
            Err(PasskeyError::CounterRegression {
                stored: 12,
                presented: 10
            })
        ));
        let id = CredentialId::new(harness.soft.credential_id().to_vec());
        assert_eq!(racing.find(&id).await.unwrap().unwrap().sign_count, 12);
    }

    #[tokio::test]
    async fn test_persistent_contention_gives_up() {
        let (racing, harness) = racing_harness(COUNTER_COMMIT_ATTEMPTS, 0).await;
        let options = begin(&racing, &harness.scope, &harness.config).await.unwrap();

        let result = finish(
            &racing,
            &harness.scope,
            &harness.config,
            &harness.signed(&options, Some(10)),
            &SystemClock,
        )
        .await;
        assert!(matches!(
            result,
            Err(PasskeyError::Store(StoreError::CounterConflict { attempts: 3 }))
        ));
    }
}
