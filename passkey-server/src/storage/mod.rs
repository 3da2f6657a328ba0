//! Credential storage module
//!
//! Credentials are persisted in PostgreSQL when `DATABASE_URL` is set.
//! Otherwise the server falls back to the in-memory store from
//! `passkey-core` (useful for development, but credentials will be lost on
//! restart). Pending challenges never live here; they stay in the session.

mod postgres;

pub use postgres::PostgresCredentialStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use passkey_core::{
    CounterUpdate, Credential, CredentialId, CredentialStore, InsertOutcome,
    MemoryCredentialStore, StoreError, UserHandle,
};

/// Storage setup errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database migration error: {0}")]
    Migration(String),
}

/// Credential storage backend
pub enum CredentialBackend {
    /// PostgreSQL storage (production)
    Postgres(PostgresCredentialStore),
    /// In-memory storage (development fallback)
    Memory(MemoryCredentialStore),
}

impl CredentialBackend {
    /// Connect to PostgreSQL and run migrations
    pub async fn with_postgres(
        database_url: &str,
        max_connections: u32,
    ) -> Result<Self, StorageError> {
        let pg_store = PostgresCredentialStore::connect(database_url, max_connections).await?;
        pg_store.migrate().await?;
        Ok(Self::Postgres(pg_store))
    }

    /// In-memory backend (development and tests)
    pub fn in_memory() -> Self {
        Self::Memory(MemoryCredentialStore::new())
    }

    /// Uses PostgreSQL if a database URL is given, otherwise falls back to in-memory.
    pub async fn connect(
        database_url: Option<&str>,
        max_connections: u32,
    ) -> Result<Self, StorageError> {
        match database_url {
            Some(url) => {
                tracing::info!("Using PostgreSQL credential storage");
                Self::with_postgres(url, max_connections).await
            }
            None => {
                tracing::warn!(
                    "DATABASE_URL not set, using in-memory credential storage - credentials will be lost on restart!"
                );
                Ok(Self::in_memory())
            }
        }
    }

    /// Check if using persistent storage
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Postgres(_))
    }

    fn store(&self) -> &dyn CredentialStore {
        match self {
            Self::Postgres(pg) => pg,
            Self::Memory(memory) => memory,
        }
    }
}

#[async_trait]
impl CredentialStore for CredentialBackend {
    async fn find(&self, credential_id: &CredentialId) -> Result<Option<Credential>, StoreError> {
        self.store().find(credential_id).await
    }

    async fn list_for_user(&self, user_handle: &UserHandle) -> Result<Vec<Credential>, StoreError> {
        self.store().list_for_user(user_handle).await
    }

    async fn insert(&self, credential: &Credential) -> Result<InsertOutcome, StoreError> {
        self.store().insert(credential).await
    }

    async fn compare_and_set_counter(
        &self,
        credential_id: &CredentialId,
        expected: u64,
        new_count: u64,
        used_at: DateTime<Utc>,
    ) -> Result<CounterUpdate, StoreError> {
        self.store()
            .compare_and_set_counter(credential_id, expected, new_count, used_at)
            .await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.store().count().await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.store().ping().await
    }
}
