//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use passkey_core::{Clock, CredentialStore, RelyingPartyConfig, SystemClock};

use crate::config::Config;
use crate::storage::CredentialBackend;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Credential store (PostgreSQL or memory fallback)
    pub store: Arc<dyn CredentialStore>,
    /// Relying party and operator identity
    pub relying_party: Arc<RelyingPartyConfig>,
    /// Time source for credential timestamps
    pub clock: Arc<dyn Clock>,
    /// Redirect target returned after a successful login
    pub redirect_to: Arc<str>,
    /// Whether the first passkey may be registered without a session
    pub bootstrap_registration: bool,
    /// Whether credentials survive a restart
    pub persistent_store: bool,
}

impl AppState {
    pub fn new(backend: CredentialBackend, relying_party: RelyingPartyConfig, config: &Config) -> Self {
        let persistent_store = backend.is_persistent();
        Self {
            store: Arc::new(backend),
            relying_party: Arc::new(relying_party),
            clock: Arc::new(SystemClock),
            redirect_to: Arc::from(config.redirect_to.as_str()),
            bootstrap_registration: config.bootstrap_registration,
            persistent_store,
        }
    }

    /// In-memory state (for testing)
    pub fn in_memory(relying_party: RelyingPartyConfig, config: &Config) -> Self {
        Self::new(CredentialBackend::in_memory(), relying_party, config)
    }
}
