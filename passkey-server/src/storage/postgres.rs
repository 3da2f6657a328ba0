//! PostgreSQL storage for passkey credentials
//!
//! Counter updates are conditional on the previously observed value, so two
//! concurrent logins cannot both commit from the same stale counter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use passkey_core::{
    CounterUpdate, Credential, CredentialId, CredentialStore, InsertOutcome, StoreError,
    UserHandle,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::StorageError;

/// PostgreSQL-backed credential storage
pub struct PostgresCredentialStore {
    pool: PgPool,
}

fn store_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}

fn to_db_count(count: u64) -> Result<i64, StoreError> {
    i64::try_from(count)
        .map_err(|_| StoreError::Serialization(format!("sign count {count} exceeds BIGINT")))
}

impl PostgresCredentialStore {
    /// Connect with a bounded pool
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        tracing::info!("Connected to PostgreSQL database");
        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;

        tracing::info!("Database migrations completed");
        Ok(())
    }

    async fn exists(&self, credential_id: &CredentialId) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM passkey_credentials WHERE credential_id = $1)
            "#,
        )
        .bind(credential_id.as_bytes())
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    async fn find(&self, credential_id: &CredentialId) -> Result<Option<Credential>, StoreError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT credential_id, user_handle, credential_type, transports,
                   attestation_type, public_key, public_key_algorithm, sign_count,
                   last_used_at, created_at
            FROM passkey_credentials
            WHERE credential_id = $1
            "#,
        )
        .bind(credential_id.as_bytes())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(CredentialRow::into_credential).transpose()
    }

    async fn list_for_user(&self, user_handle: &UserHandle) -> Result<Vec<Credential>, StoreError> {
        let rows = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT credential_id, user_handle, credential_type, transports,
                   attestation_type, public_key, public_key_algorithm, sign_count,
                   last_used_at, created_at
            FROM passkey_credentials
            WHERE user_handle = $1
            ORDER BY created_at, credential_id
            "#,
        )
        .bind(user_handle.as_bytes())
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.into_iter().map(CredentialRow::into_credential).collect()
    }

    async fn insert(&self, credential: &Credential) -> Result<InsertOutcome, StoreError> {
        let transports = credential
            .transports
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO passkey_credentials
                (credential_id, user_handle, credential_type, transports, attestation_type,
                 public_key, public_key_algorithm, sign_count, last_used_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (credential_id) DO NOTHING
            "#,
        )
        .bind(credential.credential_id.as_bytes())
        .bind(credential.user_handle.as_bytes())
        .bind(&credential.credential_type)
        .bind(transports)
        .bind(&credential.attestation_type)
        .bind(&credential.public_key)
        .bind(credential.algorithm)
        .bind(to_db_count(credential.sign_count)?)
        .bind(credential.last_used_at)
        .bind(credential.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Ok(InsertOutcome::Duplicate);
        }

        tracing::info!(
            credential_id = %credential.credential_id,
            "Credential stored in database"
        );
        Ok(InsertOutcome::Inserted)
    }

    async fn compare_and_set_counter(
        &self,
        credential_id: &CredentialId,
        expected: u64,
        new_count: u64,
        used_at: DateTime<Utc>,
    ) -> Result<CounterUpdate, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE passkey_credentials
            SET sign_count = $3, last_used_at = $4
            WHERE credential_id = $1 AND sign_count = $2
            "#,
        )
        .bind(credential_id.as_bytes())
        .bind(to_db_count(expected)?)
        .bind(to_db_count(new_count)?)
        .bind(used_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        if result.rows_affected() > 0 {
            return Ok(CounterUpdate::Committed);
        }

        if self.exists(credential_id).await? {
            Ok(CounterUpdate::Stale)
        } else {
            Ok(CounterUpdate::NotFound)
        }
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM passkey_credentials")
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

/// Database row for credentials
#[derive(sqlx::FromRow)]
struct CredentialRow {
    credential_id: Vec<u8>,
    user_handle: Vec<u8>,
    credential_type: String,
    transports: Option<serde_json::Value>,
    attestation_type: String,
    public_key: String,
    public_key_algorithm: i32,
    sign_count: i64,
    last_used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl CredentialRow {
    fn into_credential(self) -> Result<Credential, StoreError> {
        let transports = self
            .transports
            .map(serde_json::from_value::<Vec<String>>)
            .transpose()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let sign_count = u64::try_from(self.sign_count).map_err(|_| {
            StoreError::Serialization(format!("negative sign count {}", self.sign_count))
        })?;

        Ok(Credential {
            credential_id: CredentialId::new(self.credential_id),
            user_handle: UserHandle::new(self.user_handle),
            credential_type: self.credential_type,
            transports,
            attestation_type: self.attestation_type,
            public_key: self.public_key,
            algorithm: self.public_key_algorithm,
            sign_count,
            last_used_at: self.last_used_at,
            created_at: self.created_at,
        })
    }
}
