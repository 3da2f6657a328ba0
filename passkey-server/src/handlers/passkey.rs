//! Passkey ceremony endpoints
//!
//! Registration is gated: the caller needs an authenticated session, unless
//! bootstrap registration is enabled and no credential exists yet. Login is
//! open; a verified assertion marks the session authenticated.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use passkey_core::{
    authentication, registration, AuthenticationResponse, CreationOptions,
    RegistrationResponse, RequestOptions,
};
use serde::Serialize;
use tower_sessions::Session;

use crate::error::ApiError;
use crate::session::{self, SessionScope};
use crate::state::AppState;

/// Response after storing a new passkey
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub status: &'static str,
}

/// Response after a verified login
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub authenticated: bool,
    pub redirect: String,
}

async fn ensure_may_register(state: &AppState, session: &Session) -> Result<(), ApiError> {
    if session::is_authenticated(session).await? {
        return Ok(());
    }
    if state.bootstrap_registration && state.store.count().await? == 0 {
        tracing::info!("Allowing bootstrap passkey registration");
        return Ok(());
    }
    Err(ApiError::unauthorized(
        "Sign in with an existing passkey to register another",
    ))
}

/// POST /passkey/register/options
pub async fn registration_options(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<CreationOptions>, ApiError> {
    ensure_may_register(&state, &session).await?;

    let scope = SessionScope::new(session);
    let options = registration::begin(state.store.as_ref(), &scope, &state.relying_party).await?;

    tracing::debug!(
        excluded = options.exclude_credentials.len(),
        "Issued registration options"
    );
    Ok(Json(options))
}

/// POST /passkey/register
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    body: Result<Json<RegistrationResponse>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    ensure_may_register(&state, &session).await?;
    let Json(response) = body?;

    let scope = SessionScope::new(session);
    registration::finish(
        state.store.as_ref(),
        &scope,
        &state.relying_party,
        &response,
        state.clock.as_ref(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            status: "registered",
        }),
    ))
}

/// POST /passkey/login/options
pub async fn login_options(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<RequestOptions>, ApiError> {
    let scope = SessionScope::new(session);
    let options =
        authentication::begin(state.store.as_ref(), &scope, &state.relying_party).await?;

    tracing::debug!(
        allowed = options.allow_credentials.len(),
        "Issued authentication options"
    );
    Ok(Json(options))
}

/// POST /passkey/login
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    body: Result<Json<AuthenticationResponse>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(response) = body?;

    let scope = SessionScope::new(session.clone());
    let authenticated = authentication::finish(
        state.store.as_ref(),
        &scope,
        &state.relying_party,
        &response,
        state.clock.as_ref(),
    )
    .await?;

    session::establish(&session, &authenticated.credential.credential_id).await?;

    Ok(Json(LoginResponse {
        authenticated: true,
        redirect: state.redirect_to.to_string(),
    }))
}
