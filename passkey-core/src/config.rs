//! Relying party configuration
//!
//! Identity of the relying party and of the single operator account, loaded
//! from environment variables with defaults suitable for local use.

use url::Url;

use crate::client_data::normalize_origin;
use crate::credential::UserHandle;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid origin URL {value:?}: {reason}")]
    InvalidOrigin { value: String, reason: String },

    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}

/// Relying party and operator identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelyingPartyConfig {
    /// Domain bound into authenticator data (default: host of `APP_URL`, or "localhost")
    pub rp_id: String,
    /// Human-readable relying party name (default: `APP_NAME`, or "Ledger Form")
    pub rp_name: String,
    /// Expected client origin without trailing slash. `None` disables the
    /// origin check.
    pub origin: Option<String>,
    pub user_name: String,
    pub user_display_name: String,
    pub user_handle: UserHandle,
    /// Ceremony timeout advertised to the browser, in milliseconds
    pub timeout_ms: u64,
}

impl Default for RelyingPartyConfig {
    fn default() -> Self {
        Self {
            rp_id: "localhost".to_string(),
            rp_name: "Ledger Form".to_string(),
            origin: None,
            user_name: "ledger-form".to_string(),
            user_display_name: "Ledger Form Operator".to_string(),
            user_handle: UserHandle::new(b"ledger-form-user".to_vec()),
            timeout_ms: 60_000,
        }
    }
}

impl RelyingPartyConfig {
    /// Configuration for `rp_id` with the matching `https://` origin.
    pub fn for_site(rp_id: &str) -> Self {
        Self {
            rp_id: rp_id.to_string(),
            origin: Some(format!("https://{rp_id}")),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `PASSKEY_RP_ID` - Relying Party ID (default: host of `APP_URL`, or "localhost")
    /// - `PASSKEY_RP_NAME` - RP display name (default: `APP_NAME`, or "Ledger Form")
    /// - `PASSKEY_RP_ORIGIN` - expected origin (default: `APP_URL`; unset disables the check)
    /// - `PASSKEY_USER_NAME`, `PASSKEY_USER_DISPLAY_NAME`, `PASSKEY_USER_HANDLE`
    /// - `PASSKEY_TIMEOUT_MS` - ceremony timeout (default: 60000)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let app_url = var("APP_URL");

        let origin = match var("PASSKEY_RP_ORIGIN").or_else(|| app_url.clone()) {
            Some(raw) => Some(parse_origin(&raw)?),
            None => None,
        };

        let rp_id = match var("PASSKEY_RP_ID") {
            Some(id) => id,
            None => app_url
                .as_deref()
                .and_then(|u| Url::parse(u).ok())
                .and_then(|u| u.host_str().map(str::to_string))
                .unwrap_or(defaults.rp_id),
        };

        let timeout_ms = match var("PASSKEY_TIMEOUT_MS") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
                var: "PASSKEY_TIMEOUT_MS",
                reason: format!("{e}"),
            })?,
            None => defaults.timeout_ms,
        };

        Ok(Self {
            rp_id,
            rp_name: var("PASSKEY_RP_NAME")
                .or_else(|| var("APP_NAME"))
                .unwrap_or(defaults.rp_name),
            origin,
            user_name: var("PASSKEY_USER_NAME").unwrap_or(defaults.user_name),
            user_display_name: var("PASSKEY_USER_DISPLAY_NAME")
                .unwrap_or(defaults.user_display_name),
            user_handle: var("PASSKEY_USER_HANDLE")
                .map(|h| UserHandle::new(h.into_bytes()))
                .unwrap_or(defaults.user_handle),
            timeout_ms,
        })
    }

    pub fn expected_origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }
}

fn parse_origin(raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidOrigin {
        value: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidOrigin {
            value: raw.to_string(),
            reason: "origin has no host".to_string(),
        });
    }
    Ok(normalize_origin(&url.origin().ascii_serialization()).to_string())
}
