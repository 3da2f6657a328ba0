//! Router configuration module
//!
//! Configures all routes, middleware layers, and creates the application router.

use std::{sync::Arc, time::Duration};

use axum::{
    http::{header, Method, StatusCode},
    middleware,
    routing::{get, post},
    Router,
};
use passkey_core::RelyingPartyConfig;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::handlers::{
    current_session, health, list_credentials, login, login_options, logout, ready, register,
    registration_options,
};
use crate::session::{require_authenticated, session_layer};
use crate::state::AppState;

/// Create the application router with default config and an in-memory store (for testing)
pub fn create_router() -> Router {
    let config = Config::default();
    let state = AppState::in_memory(RelyingPartyConfig::default(), &config);
    create_router_with_state(&config, state)
}

/// Create the application router with custom configuration
pub fn create_router_with_state(config: &Config, state: AppState) -> Router {
    // Configure CORS based on allowed_origins
    let cors = match &config.allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            tracing::info!("CORS: Restricting to {} origin(s)", origins.len());
            // session cookies cross origins only with explicit credentials
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
                .allow_credentials(true)
        }
        _ => {
            tracing::warn!("CORS: Allowing all origins (dev mode)");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    // Request body limit
    let body_limit = RequestBodyLimitLayer::new(config.body_limit_kb * 1024);

    // Request timeout
    let timeout = TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(config.timeout_secs),
    );

    let protected = Router::new()
        .route("/api/credentials", get(list_credentials))
        .route_layer(middleware::from_fn(require_authenticated));

    // Base router with common layers
    let router = Router::new()
        .route("/passkey/register/options", post(registration_options))
        .route("/passkey/register", post(register))
        .route("/passkey/login/options", post(login_options))
        .route("/passkey/login", post(login))
        .route("/logout", post(logout))
        .route("/api/session", get(current_session))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .merge(protected)
        .with_state(state)
        .layer(session_layer(config))
        .layer(cors)
        .layer(body_limit)
        .layer(timeout);

    // Conditionally apply rate limiting (disabled in tests, enabled in production)
    if config.rate_limit_enabled {
        let governor_conf = GovernorConfigBuilder::default()
            .per_second(config.rate_limit_per_sec)
            .burst_size(config.rate_limit_burst)
            .finish();

        match governor_conf {
            Some(governor_conf) => {
                tracing::info!(
                    "Rate limiting: {} req/s (burst: {})",
                    config.rate_limit_per_sec,
                    config.rate_limit_burst
                );
                return router
                    .layer(GovernorLayer::new(Arc::new(governor_conf)))
                    .layer(TraceLayer::new_for_http());
            }
            None => tracing::error!(
                per_sec = config.rate_limit_per_sec,
                burst = config.rate_limit_burst,
                "Invalid rate limiter settings, serving without rate limiting"
            ),
        }
    } else {
        tracing::warn!("Rate limiting: DISABLED");
    }

    router.layer(TraceLayer::new_for_http())
}
