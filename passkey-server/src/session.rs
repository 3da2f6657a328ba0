//! Session gate
//!
//! The HTTP session carries two things: the pending ceremony challenges
//! (through [`SessionScope`]) and the authenticated flag set after a verified
//! login. The session id is cycled before the flag is written so a
//! pre-login session id never becomes an authenticated one.

use async_trait::async_trait;
use axum::{extract::Request, middleware::Next, response::Response};
use passkey_core::{ChallengeScope, CredentialId, StoreError};
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer};

use crate::config::Config;
use crate::error::ApiError;

pub const AUTHENTICATED_KEY: &str = "passkey.authenticated";
pub const CREDENTIAL_KEY: &str = "passkey.credential_id";

/// Pending challenges stored in the caller's HTTP session.
pub struct SessionScope(Session);

impl SessionScope {
    pub fn new(session: Session) -> Self {
        Self(session)
    }
}

fn scope_error(err: tower_sessions::session::Error) -> StoreError {
    StoreError::Unavailable(format!("session: {err}"))
}

#[async_trait]
impl ChallengeScope for SessionScope {
    async fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.0.insert(key, value).await.map_err(scope_error)
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.0.remove::<String>(key).await.map_err(scope_error)
    }
}

pub async fn is_authenticated(session: &Session) -> Result<bool, ApiError> {
    Ok(session
        .get::<bool>(AUTHENTICATED_KEY)
        .await?
        .unwrap_or(false))
}

/// base64url id of the credential that authenticated the session.
pub async fn authenticated_credential(session: &Session) -> Result<Option<String>, ApiError> {
    Ok(session.get::<String>(CREDENTIAL_KEY).await?)
}

/// Mark the session authenticated under a fresh session id.
pub async fn establish(session: &Session, credential_id: &CredentialId) -> Result<(), ApiError> {
    session.cycle_id().await?;
    session.insert(AUTHENTICATED_KEY, true).await?;
    session
        .insert(CREDENTIAL_KEY, credential_id.to_base64url())
        .await?;
    tracing::info!(credential_id = %credential_id, "Session authenticated");
    Ok(())
}

/// Drop all session data and the session record.
pub async fn end(session: &Session) -> Result<(), ApiError> {
    session.flush().await?;
    tracing::info!("Session ended");
    Ok(())
}

/// Middleware rejecting requests without an authenticated session.
pub async fn require_authenticated(
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if is_authenticated(&session).await? {
        Ok(next.run(request).await)
    } else {
        Err(ApiError::unauthorized("Not authenticated"))
    }
}

/// Session layer backed by an in-process store.
pub fn session_layer(config: &Config) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_secure(config.session_secure_cookie)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            config.session_inactivity_minutes,
        )))
}
