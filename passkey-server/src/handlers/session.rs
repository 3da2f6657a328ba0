//! Session status, logout and the protected credential listing

use axum::{extract::State, Json};
use passkey_core::CredentialSummary;
use serde::Serialize;
use tower_sessions::Session;

use crate::error::ApiError;
use crate::session;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub authenticated: bool,
    /// Credential that authenticated this session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CredentialsResponse {
    pub credentials: Vec<CredentialSummary>,
}

/// GET /api/session
pub async fn current_session(session: Session) -> Result<Json<SessionResponse>, ApiError> {
    let authenticated = session::is_authenticated(&session).await?;
    let credential_id = if authenticated {
        session::authenticated_credential(&session).await?
    } else {
        None
    };
    Ok(Json(SessionResponse {
        authenticated,
        credential_id,
    }))
}

/// POST /logout
pub async fn logout(session: Session) -> Result<Json<SessionResponse>, ApiError> {
    session::end(&session).await?;
    Ok(Json(SessionResponse {
        authenticated: false,
        credential_id: None,
    }))
}

/// GET /api/credentials - requires an authenticated session
///
/// Summaries never include key material.
pub async fn list_credentials(
    State(state): State<AppState>,
) -> Result<Json<CredentialsResponse>, ApiError> {
    let credentials = state
        .store
        .list_for_user(&state.relying_party.user_handle)
        .await?;

    Ok(Json(CredentialsResponse {
        credentials: credentials.iter().map(|c| c.summary()).collect(),
    }))
}
