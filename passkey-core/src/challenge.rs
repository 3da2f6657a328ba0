//! Single-use ceremony challenges.
//!
//! A challenge lives in the caller's [`ChallengeScope`] (the HTTP session in
//! the server, a plain map elsewhere) under a key chosen by the ceremony
//! kind. Issuing replaces any pending challenge of the same kind; consuming
//! reads and removes it in one step.

use std::fmt;

use async_trait::async_trait;
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::client_data::constant_time_eq;
use crate::codec;
use crate::error::StoreError;

pub const CHALLENGE_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CeremonyKind {
    Registration,
    Authentication,
}

impl CeremonyKind {
    /// Session key holding the pending challenge for this kind.
    pub fn session_key(self) -> &'static str {
        match self {
            Self::Registration => "webauthn.registration.challenge",
            Self::Authentication => "webauthn.authentication.challenge",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Authentication => "authentication",
        }
    }
}

impl fmt::Display for CeremonyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 32 bytes from the OS CSPRNG.
#[derive(Clone, PartialEq, Eq)]
pub struct Challenge([u8; CHALLENGE_LEN]);

impl Challenge {
    pub fn generate() -> Self {
        let mut bytes = [0u8; CHALLENGE_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; CHALLENGE_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse the stored base64url form. Anything that is not exactly
    /// [`CHALLENGE_LEN`] bytes yields `None`.
    pub fn from_base64url(text: &str) -> Option<Self> {
        let bytes = codec::decode_url(text).ok()?;
        let bytes: [u8; CHALLENGE_LEN] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn to_base64url(&self) -> String {
        codec::encode_url(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Constant-time comparison against presented bytes.
    pub fn matches(&self, presented: &[u8]) -> bool {
        constant_time_eq(&self.0, presented)
    }
}

impl fmt::Debug for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Challenge(..)")
    }
}

/// Per-caller key/value state that pending challenges are kept in.
#[async_trait]
pub trait ChallengeScope: Send + Sync {
    async fn put(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Read and remove in one step.
    async fn take(&self, key: &str) -> Result<Option<String>, StoreError>;
}

/// Store a fresh challenge for `kind`, replacing any pending one.
pub async fn issue(scope: &dyn ChallengeScope, kind: CeremonyKind) -> Result<Challenge, StoreError> {
    let challenge = Challenge::generate();
    scope.put(kind.session_key(), challenge.to_base64url()).await?;
    tracing::debug!(ceremony = %kind, "Issued challenge");
    Ok(challenge)
}

/// Take the pending challenge for `kind`. A second call returns `None`.
pub async fn consume(
    scope: &dyn ChallengeScope,
    kind: CeremonyKind,
) -> Result<Option<Challenge>, StoreError> {
    let Some(stored) = scope.take(kind.session_key()).await? else {
        return Ok(None);
    };

    let challenge = Challenge::from_base64url(&stored);
    if challenge.is_none() {
        tracing::warn!(ceremony = %kind, "Discarding unreadable pending challenge");
    }
    Ok(challenge)
}

/// In-process scope for tests and tooling.
#[derive(Debug, Default)]
pub struct MemoryScope {
    values: DashMap<String, String>,
}

impl MemoryScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

#[async_trait]
impl ChallengeScope for MemoryScope {
    async fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.remove(key).map(|(_, value)| value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_challenges_differ() {
        let a = Challenge::generate();
        let b = Challenge::generate();
        assert_ne!(a, b);
        assert_eq!(a.to_base64url().len(), 43);
    }

    #[tokio::test]
    async fn test_consume_is_single_use() {
        let scope = MemoryScope::new();
        let issued = issue(&scope, CeremonyKind::Authentication).await.unwrap();

        let consumed = consume(&scope, CeremonyKind::Authentication).await.unwrap();
        assert_eq!(consumed, Some(issued));
        assert_eq!(consume(&scope, CeremonyKind::Authentication).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_latest_issue_wins() {
        let scope = MemoryScope::new();
        let mut last = issue(&scope, CeremonyKind::Registration).await.unwrap();
        for _ in 0..4 {
            last = issue(&scope, CeremonyKind::Registration).await.unwrap();
        }
        assert_eq!(
            consume(&scope, CeremonyKind::Registration).await.unwrap(),
            Some(last)
        );
    }

    #[tokio::test]
    async fn test_kinds_do_not_share_slots() {
        let scope = MemoryScope::new();
        issue(&scope, CeremonyKind::Registration).await.unwrap();
        assert_eq!(consume(&scope, CeremonyKind::Authentication).await.unwrap(), None);
        assert!(scope.contains(CeremonyKind::Registration.session_key()));
    }

    #[tokio::test]
    async fn test_unreadable_stored_value_is_treated_as_absent() {
        let scope = MemoryScope::new();
        scope
            .put(CeremonyKind::Authentication.session_key(), "c2hvcnQ".into())
            .await
            .unwrap();
        assert_eq!(consume(&scope, CeremonyKind::Authentication).await.unwrap(), None);
        assert!(!scope.contains(CeremonyKind::Authentication.session_key()));
    }

    #[test]
    fn test_matches_is_exact() {
        let challenge = Challenge::from_bytes([7u8; CHALLENGE_LEN]);
        assert!(challenge.matches(&[7u8; CHALLENGE_LEN]));
        let mut other = [7u8; CHALLENGE_LEN];
        other[31] = 8;
        assert!(!challenge.matches(&other));
        assert!(!challenge.matches(&[7u8; 31]));
    }
}
