//! Passkey Server Library - HTTP surface for passkey registration and login
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod session;
pub mod state;
pub mod storage;

pub use config::Config;
pub use error::ApiError;
pub use routes::{create_router, create_router_with_state};
pub use state::AppState;
pub use storage::{CredentialBackend, PostgresCredentialStore, StorageError};
