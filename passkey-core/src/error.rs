use thiserror::Error;

/// Failures raised by the credential store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Counter update conflicted {attempts} times")]
    CounterConflict { attempts: u32 },
}

/// Outcome of a rejected passkey ceremony.
///
/// Every variant except [`PasskeyError::Store`] is a request-scoped
/// validation failure: the caller restarts the ceremony with a fresh
/// challenge. None of them leaves a partially written credential behind.
#[derive(Error, Debug)]
pub enum PasskeyError {
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("No pending challenge for this ceremony")]
    ChallengeExpired,

    #[error("Challenge mismatch")]
    ChallengeMismatch,

    #[error("Origin mismatch")]
    OriginMismatch,

    #[error("Unsupported ceremony type: {0:?}")]
    UnsupportedCeremonyType(String),

    #[error("Relying party id hash mismatch")]
    RelyingPartyMismatch,

    #[error("Unsupported key format: {0}")]
    UnsupportedKeyFormat(String),

    #[error("Signature verification failed")]
    SignatureInvalid,

    #[error("Sign count regressed: stored={stored}, presented={presented}")]
    CounterRegression { stored: u64, presented: u64 },

    #[error("Credential already registered")]
    DuplicateCredential,

    #[error("Credential not found")]
    CredentialNotFound,

    #[error("User handle mismatch")]
    UserHandleMismatch,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl PasskeyError {
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedResponse(detail.into())
    }

    pub(crate) fn key_format(detail: impl Into<String>) -> Self {
        Self::UnsupportedKeyFormat(detail.into())
    }

    /// Stable machine-readable code for API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedResponse(_) => "MALFORMED_RESPONSE",
            Self::ChallengeExpired => "CHALLENGE_EXPIRED",
            Self::ChallengeMismatch => "CHALLENGE_MISMATCH",
            Self::OriginMismatch => "ORIGIN_MISMATCH",
            Self::UnsupportedCeremonyType(_) => "UNSUPPORTED_CEREMONY_TYPE",
            Self::RelyingPartyMismatch => "RELYING_PARTY_MISMATCH",
            Self::UnsupportedKeyFormat(_) => "UNSUPPORTED_KEY_FORMAT",
            Self::SignatureInvalid => "SIGNATURE_INVALID",
            Self::CounterRegression { .. } => "COUNTER_REGRESSION",
            Self::DuplicateCredential => "DUPLICATE_CREDENTIAL",
            Self::CredentialNotFound => "CREDENTIAL_NOT_FOUND",
            Self::UserHandleMismatch => "USER_HANDLE_MISMATCH",
            Self::Store(_) => "STORE_UNAVAILABLE",
        }
    }

    /// Message safe to show to the operator. Never includes key material,
    /// challenge bytes or store internals.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MalformedResponse(_) => "The passkey response is malformed.",
            Self::ChallengeExpired => {
                "The passkey challenge has expired. Reload the page and try again."
            }
            Self::ChallengeMismatch => "The passkey challenge does not match.",
            Self::OriginMismatch => "The passkey response came from an unexpected origin.",
            Self::UnsupportedCeremonyType(_) => "The passkey response is for the wrong ceremony.",
            Self::RelyingPartyMismatch => "The passkey is bound to a different site.",
            Self::UnsupportedKeyFormat(_) => "The passkey public key format is not supported.",
            Self::SignatureInvalid => "The passkey signature could not be verified.",
            Self::CounterRegression { .. } => {
                "The passkey sign count went backwards. The authenticator may be cloned."
            }
            Self::DuplicateCredential => "This passkey is already registered.",
            Self::CredentialNotFound => "No registered passkey matches this response.",
            Self::UserHandleMismatch => "The passkey belongs to a different user.",
            Self::Store(_) => "Credential storage is temporarily unavailable.",
        }
    }

    /// True for failures caused by infrastructure rather than by the
    /// presented response.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

pub type Result<T> = std::result::Result<T, PasskeyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            PasskeyError::malformed("x"),
            PasskeyError::ChallengeExpired,
            PasskeyError::ChallengeMismatch,
            PasskeyError::OriginMismatch,
            PasskeyError::UnsupportedCeremonyType("webauthn.create".into()),
            PasskeyError::RelyingPartyMismatch,
            PasskeyError::key_format("x"),
            PasskeyError::SignatureInvalid,
            PasskeyError::CounterRegression {
                stored: 2,
                presented: 1,
            },
            PasskeyError::DuplicateCredential,
            PasskeyError::CredentialNotFound,
            PasskeyError::UserHandleMismatch,
            PasskeyError::Store(StoreError::Unavailable("down".into())),
        ];

        let mut codes: Vec<_> = errors.iter().map(PasskeyError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_store_error_is_infrastructure() {
        let err: PasskeyError = StoreError::Query("boom".into()).into();
        assert!(err.is_infrastructure());
        assert!(!PasskeyError::SignatureInvalid.is_infrastructure());
    }
}
