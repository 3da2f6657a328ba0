//! Registered credential model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::{self, CodecError};

/// The only credential type WebAuthn defines.
pub const PUBLIC_KEY_CREDENTIAL_TYPE: &str = "public-key";

/// Attestation trust level recorded for every credential.
pub const ATTESTATION_NONE: &str = "none";

macro_rules! byte_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Vec<u8>);

        impl $name {
            pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
                Self(bytes.into())
            }

            pub fn from_base64url(text: &str) -> Result<Self, CodecError> {
                codec::decode_url(text).map(Self)
            }

            pub fn to_base64url(&self) -> String {
                codec::encode_url(&self.0)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn into_bytes(self) -> Vec<u8> {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_base64url())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_base64url())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_base64url())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                Self::from_base64url(&text).map_err(serde::de::Error::custom)
            }
        }
    };
}

byte_identifier!(
    /// Authenticator-chosen credential identifier. Serialized as base64url.
    CredentialId
);

byte_identifier!(
    /// Opaque identifier of the logical user. Not secret.
    UserHandle
);

/// A registered authenticator key.
///
/// `public_key` and `algorithm` are fixed at registration. Only a successful
/// authentication moves `sign_count` and `last_used_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub credential_id: CredentialId,
    pub user_handle: UserHandle,
    pub credential_type: String,
    pub transports: Option<Vec<String>>,
    pub attestation_type: String,
    /// Key text exactly as received at registration.
    pub public_key: String,
    /// COSE algorithm identifier declared at registration.
    pub algorithm: i32,
    pub sign_count: u64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Credential {
    /// A freshly registered credential: counter zero, never used.
    pub fn new(
        credential_id: CredentialId,
        user_handle: UserHandle,
        public_key: String,
        algorithm: i32,
        transports: Option<Vec<String>>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            credential_id,
            user_handle,
            credential_type: PUBLIC_KEY_CREDENTIAL_TYPE.to_string(),
            transports,
            attestation_type: ATTESTATION_NONE.to_string(),
            public_key,
            algorithm,
            sign_count: 0,
            last_used_at: None,
            created_at,
        }
    }

    /// Listing view without key material.
    pub fn summary(&self) -> CredentialSummary {
        CredentialSummary {
            id: self.credential_id.to_base64url(),
            credential_type: self.credential_type.clone(),
            algorithm: self.algorithm,
            transports: self.transports.clone().unwrap_or_default(),
            attestation_type: self.attestation_type.clone(),
            sign_count: self.sign_count,
            last_used_at: self.last_used_at,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub credential_type: String,
    pub algorithm: i32,
    pub transports: Vec<String>,
    pub attestation_type: String,
    pub sign_count: u64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Drop empty and duplicate transport hints; an empty list becomes `None`.
pub fn normalize_transports(transports: Option<&[String]>) -> Option<Vec<String>> {
    let mut hints: Vec<String> = Vec::new();
    for hint in transports.unwrap_or_default() {
        let hint = hint.trim();
        if !hint.is_empty() && !hints.iter().any(|h| h == hint) {
            hints.push(hint.to_string());
        }
    }
    (!hints.is_empty()).then_some(hints)
}
