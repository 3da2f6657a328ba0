//! Credential persistence seam.
//!
//! [`CredentialStore`] is implemented here by [`MemoryCredentialStore`] and in
//! the server crate by the PostgreSQL backend. Both honour the same two
//! write rules: inserts never overwrite, and counter updates only land when
//! the caller observed the current value.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::credential::{Credential, CredentialId, UserHandle};
use crate::error::StoreError;

/// Result of [`CredentialStore::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// Result of [`CredentialStore::compare_and_set_counter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterUpdate {
    Committed,
    /// The stored counter no longer equals the expected value.
    Stale,
    NotFound,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find(&self, credential_id: &CredentialId) -> Result<Option<Credential>, StoreError>;

    /// Every credential registered for `user_handle`, oldest first.
    async fn list_for_user(&self, user_handle: &UserHandle) -> Result<Vec<Credential>, StoreError>;

    /// Persist a new credential unless its id is already taken.
    async fn insert(&self, credential: &Credential) -> Result<InsertOutcome, StoreError>;

    /// Set `sign_count` to `new_count` and `last_used_at` to `used_at`, only
    /// if the stored counter still equals `expected`.
    async fn compare_and_set_counter(
        &self,
        credential_id: &CredentialId,
        expected: u64,
        new_count: u64,
        used_at: DateTime<Utc>,
    ) -> Result<CounterUpdate, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    /// Readiness probe.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Process-local store backed by a sharded map.
///
/// Counter updates hold the entry's shard lock for the compare and the
/// write, which makes them atomic with respect to each other.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credentials: DashMap<CredentialId, Credential>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find(&self, credential_id: &CredentialId) -> Result<Option<Credential>, StoreError> {
        Ok(self
            .credentials
            .get(credential_id)
            .map(|entry| entry.value().clone()))
    }

    async fn list_for_user(&self, user_handle: &UserHandle) -> Result<Vec<Credential>, StoreError> {
        let mut credentials: Vec<Credential> = self
            .credentials
            .iter()
            .filter(|entry| &entry.value().user_handle == user_handle)
            .map(|entry| entry.value().clone())
            .collect();
        credentials.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.credential_id.cmp(&b.credential_id))
        });
        Ok(credentials)
    }

    async fn insert(&self, credential: &Credential) -> Result<InsertOutcome, StoreError> {
        match self.credentials.entry(credential.credential_id.clone()) {
            Entry::Occupied(_) => Ok(InsertOutcome::Duplicate),
            Entry::Vacant(slot) => {
                slot.insert(credential.clone());
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn compare_and_set_counter(
        &self,
        credential_id: &CredentialId,
        expected: u64,
        new_count: u64,
        used_at: DateTime<Utc>,
    ) -> Result<CounterUpdate, StoreError> {
        let Some(mut entry) = self.credentials.get_mut(credential_id) else {
            return Ok(CounterUpdate::NotFound);
        };
        if entry.sign_count != expected {
            return Ok(CounterUpdate::Stale);
        }
        entry.sign_count = new_count;
        entry.last_used_at = Some(used_at);
        Ok(CounterUpdate::Committed)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.credentials.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn credential(id: &[u8], user: &[u8]) -> Credential {
        Credential::new(
            CredentialId::new(id.to_vec()),
            UserHandle::new(user.to_vec()),
            "key".into(),
            -8,
            None,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_insert_reports_duplicates_without_overwriting() {
        let store = MemoryCredentialStore::new();
        let original = credential(b"a", b"user");
        assert_eq!(store.insert(&original).await.unwrap(), InsertOutcome::Inserted);

        let mut replacement = credential(b"a", b"user");
        replacement.public_key = "other".into();
        assert_eq!(store.insert(&replacement).await.unwrap(), InsertOutcome::Duplicate);

        let stored = store.find(&original.credential_id).await.unwrap().unwrap();
        assert_eq!(stored.public_key, "key");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_filters_by_user_handle() {
        let store = MemoryCredentialStore::new();
        store.insert(&credential(b"a", b"user")).await.unwrap();
        store.insert(&credential(b"b", b"user")).await.unwrap();
        store.insert(&credential(b"c", b"someone-else")).await.unwrap();

        let listed = store
            .list_for_user(&UserHandle::new(b"user".to_vec()))
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn test_compare_and_set_requires_observed_counter() {
        let store = MemoryCredentialStore::new();
        let c = credential(b"a", b"user");
        store.insert(&c).await.unwrap();
        let now = Utc::now();

        assert_eq!(
            store.compare_and_set_counter(&c.credential_id, 0, 5, now).await.unwrap(),
            CounterUpdate::Committed
        );
        assert_eq!(
            store.compare_and_set_counter(&c.credential_id, 0, 3, now).await.unwrap(),
            CounterUpdate::Stale
        );
        assert_eq!(
            store
                .compare_and_set_counter(&CredentialId::new(b"zz".to_vec()), 0, 1, now)
                .await
                .unwrap(),
            CounterUpdate::NotFound
        );

        let stored = store.find(&c.credential_id).await.unwrap().unwrap();
        assert_eq!(stored.sign_count, 5);
        assert_eq!(stored.last_used_at, Some(now));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_commits_from_same_counter_have_one_winner() {
        let store = Arc::new(MemoryCredentialStore::new());
        let c = credential(b"a", b"user");
        store.insert(&c).await.unwrap();

        let mut handles = Vec::new();
        for new_count in 1..=16u64 {
            let store = Arc::clone(&store);
            let id = c.credential_id.clone();
            handles.push(tokio::spawn(async move {
                store
                    .compare_and_set_counter(&id, 0, new_count, Utc::now())
                    .await
                    .unwrap()
            }));
        }

        let mut committed = 0;
        for handle in handles {
            if handle.await.unwrap() == CounterUpdate::Committed {
                committed += 1;
            }
        }
        assert_eq!(committed, 1);
    }
}
