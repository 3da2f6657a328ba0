//! JSON shapes exchanged with the browser, in WebAuthn's camelCase.
//!
//! Response fields default to empty rather than failing deserialization, so
//! a missing field surfaces as a ceremony error
//! ([`PasskeyError::MalformedResponse`](crate::PasskeyError)) instead of a
//! transport-level rejection.

use serde::{Deserialize, Serialize};

use crate::credential::{Credential, PUBLIC_KEY_CREDENTIAL_TYPE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelyingPartyEntity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    /// base64url user handle.
    pub id: String,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialParameter {
    #[serde(rename = "type")]
    pub credential_type: String,
    pub alg: i32,
}

impl CredentialParameter {
    pub fn public_key(alg: i32) -> Self {
        Self {
            credential_type: PUBLIC_KEY_CREDENTIAL_TYPE.to_string(),
            alg,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDescriptor {
    #[serde(rename = "type")]
    pub credential_type: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<String>>,
}

impl CredentialDescriptor {
    /// Descriptor for `excludeCredentials`: id only.
    pub fn exclude(credential: &Credential) -> Self {
        Self {
            credential_type: credential.credential_type.clone(),
            id: credential.credential_id.to_base64url(),
            transports: None,
        }
    }

    /// Descriptor for `allowCredentials`: id plus transport hints.
    pub fn allow(credential: &Credential) -> Self {
        Self {
            credential_type: credential.credential_type.clone(),
            id: credential.credential_id.to_base64url(),
            transports: Some(credential.transports.clone().unwrap_or_default()),
        }
    }
}

/// `PublicKeyCredentialCreationOptions` as sent to `navigator.credentials.create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationOptions {
    pub challenge: String,
    pub rp: RelyingPartyEntity,
    pub user: UserEntity,
    pub pub_key_cred_params: Vec<CredentialParameter>,
    pub timeout: u64,
    pub attestation: String,
    pub exclude_credentials: Vec<CredentialDescriptor>,
}

/// `PublicKeyCredentialRequestOptions` as sent to `navigator.credentials.get`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    pub challenge: String,
    pub rp_id: String,
    pub timeout: u64,
    pub allow_credentials: Vec<CredentialDescriptor>,
    pub user_verification: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationPayload {
    #[serde(default, rename = "clientDataJSON")]
    pub client_data_json: String,
    #[serde(default)]
    pub attestation_object: String,
    /// Key text as exported by the browser (`getPublicKey()`).
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub public_key_algorithm: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub raw_id: String,
    #[serde(default, rename = "type")]
    pub credential_type: String,
    /// The challenge the client was answering, echoed back.
    #[serde(default)]
    pub challenge: String,
    #[serde(default)]
    pub response: AttestationPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionPayload {
    #[serde(default, rename = "clientDataJSON")]
    pub client_data_json: String,
    #[serde(default)]
    pub authenticator_data: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub raw_id: String,
    #[serde(default, rename = "type")]
    pub credential_type: String,
    #[serde(default)]
    pub challenge: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_count: Option<u64>,
    #[serde(default)]
    pub response: AssertionPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_response_wire_names() {
        let json = r#"{
            "id": "YWJj",
            "rawId": "YWJj",
            "type": "public-key",
            "challenge": "Y2hhbGxlbmdl",
            "signCount": 10,
            "response": {
                "clientDataJSON": "e30",
                "authenticatorData": "AAAA",
                "signature": "AAAA",
                "userHandle": "dXNlcg"
            }
        }"#;
        let parsed: AuthenticationResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.raw_id, "YWJj");
        assert_eq!(parsed.credential_type, "public-key");
        assert_eq!(parsed.sign_count, Some(10));
        assert_eq!(parsed.response.client_data_json, "e30");
        assert_eq!(parsed.response.user_handle.as_deref(), Some("dXNlcg"));
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let parsed: RegistrationResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.id.is_empty());
        assert!(parsed.response.public_key_algorithm.is_none());

        let parsed: AuthenticationResponse = serde_json::from_str(r#"{"signCount":null}"#).unwrap();
        assert!(parsed.sign_count.is_none());
    }

    #[test]
    fn test_creation_options_serialize_camel_case() {
        let options = CreationOptions {
            challenge: "c".into(),
            rp: RelyingPartyEntity {
                id: "example.test".into(),
                name: "Example".into(),
            },
            user: UserEntity {
                id: "dQ".into(),
                name: "op".into(),
                display_name: "Operator".into(),
            },
            pub_key_cred_params: vec![CredentialParameter::public_key(-7)],
            timeout: 60_000,
            attestation: "none".into(),
            exclude_credentials: vec![],
        };
        let value = serde_json::to_value(&options).unwrap();
        assert_eq!(value["user"]["displayName"], "Operator");
        assert_eq!(value["pubKeyCredParams"][0]["type"], "public-key");
        assert_eq!(value["pubKeyCredParams"][0]["alg"], -7);
        assert!(value["excludeCredentials"].as_array().unwrap().is_empty());
    }
}
