//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod health;
pub mod passkey;
pub mod session;

pub use crate::state::AppState;
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use passkey::{
    login, login_options, register, registration_options, LoginResponse, RegisterResponse,
};
pub use session::{current_session, list_credentials, logout, CredentialsResponse, SessionResponse};
