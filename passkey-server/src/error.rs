//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use passkey_core::{PasskeyError, StoreError};
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - the body is not the JSON shape the endpoint expects
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthorized - no authenticated session
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Session store failure
    #[error("Session error: {0}")]
    Session(String),

    /// Passkey ceremony error
    #[error("Passkey error: {0}")]
    Passkey(#[from] PasskeyError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Passkey(PasskeyError::Store(err))
    }
}

impl From<tower_sessions::session::Error> for ApiError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Session(err.to_string())
    }
}

impl ApiError {
    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Session(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Passkey(ref e) => match e {
                PasskeyError::CredentialNotFound => StatusCode::NOT_FOUND,
                PasskeyError::DuplicateCredential => StatusCode::CONFLICT,

                // Infrastructure failures
                PasskeyError::Store(StoreError::Unavailable(_))
                | PasskeyError::Store(StoreError::CounterConflict { .. }) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                PasskeyError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,

                // Ceremony validation failures → 422 Unprocessable Entity
                PasskeyError::MalformedResponse(_)
                | PasskeyError::ChallengeExpired
                | PasskeyError::ChallengeMismatch
                | PasskeyError::OriginMismatch
                | PasskeyError::UnsupportedCeremonyType(_)
                | PasskeyError::RelyingPartyMismatch
                | PasskeyError::UnsupportedKeyFormat(_)
                | PasskeyError::SignatureInvalid
                | PasskeyError::CounterRegression { .. }
                | PasskeyError::UserHandleMismatch => StatusCode::UNPROCESSABLE_ENTITY,
            },
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Session(_) => "SESSION_UNAVAILABLE",
            Self::Passkey(ref e) => e.code(),
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            // Ceremony errors carry a fixed operator-facing message
            Self::Passkey(ref e) => e.user_message().to_string(),
            Self::Session(_) => "Session storage is temporarily unavailable".to_string(),
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Session(_) => "session",
            Self::Passkey(ref e) if e.is_infrastructure() => "store",
            Self::Passkey(_) => "passkey",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        match &self {
            Self::BadRequest(_) => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Client error"
                );
            }
            Self::Unauthorized(_) => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Authentication error"
                );
            }
            Self::Passkey(e) if !e.is_infrastructure() => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Passkey ceremony rejected"
                );
            }
            Self::Session(_) | Self::Passkey(_) => {
                tracing::error!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    client_message = %client_message,
                    "Server error"
                );
            }
        }

        // All error responses include a `code` field for programmatic error handling
        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_failures_are_unprocessable() {
        for err in [
            PasskeyError::ChallengeExpired,
            PasskeyError::SignatureInvalid,
            PasskeyError::CounterRegression {
                stored: 3,
                presented: 1,
            },
            PasskeyError::UnsupportedCeremonyType("webauthn.create".into()),
            PasskeyError::malformed("signCount exceeds the 32-bit authenticator counter"),
        ] {
            assert_eq!(
                ApiError::from(err).status_code(),
                StatusCode::UNPROCESSABLE_ENTITY
            );
        }
    }

    #[test]
    fn test_lookup_and_conflict_statuses() {
        assert_eq!(
            ApiError::from(PasskeyError::CredentialNotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(PasskeyError::DuplicateCredential).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_store_failures_hide_details() {
        let err = ApiError::from(PasskeyError::Store(StoreError::Query(
            "relation passkey_credentials does not exist".into(),
        )));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "STORE_UNAVAILABLE");
        assert!(!err.client_message().contains("relation"));

        let err = ApiError::from(PasskeyError::Store(StoreError::Unavailable("pool".into())));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_session_failures_hide_details() {
        let err = ApiError::Session("memory store poisoned".into());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error_code(), "SESSION_UNAVAILABLE");
        assert!(!err.client_message().contains("poisoned"));
    }

    #[test]
    fn test_error_code_passthrough() {
        assert_eq!(
            ApiError::from(PasskeyError::OriginMismatch).error_code(),
            "ORIGIN_MISMATCH"
        );
        assert_eq!(ApiError::unauthorized("no").error_code(), "UNAUTHORIZED");
    }
}
