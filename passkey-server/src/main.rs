//! Passkey Server - session gate for a single-operator ledger tool
//!
//! Exposes the passkey ceremonies over HTTP:
//! - POST /passkey/register/options, POST /passkey/register
//! - POST /passkey/login/options, POST /passkey/login
//! - POST /logout, GET /api/session, GET /api/credentials

use std::net::SocketAddr;

use passkey_core::RelyingPartyConfig;
use passkey_server::{create_router_with_state, AppState, Config, CredentialBackend};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,passkey_server=debug,passkey_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let relying_party = RelyingPartyConfig::from_env()?;

    tracing::info!(
        rp_id = %relying_party.rp_id,
        rp_name = %relying_party.rp_name,
        "Relying party configured"
    );
    match relying_party.expected_origin() {
        Some(origin) => tracing::info!(origin, "Checking client origin"),
        None => tracing::warn!("PASSKEY_RP_ORIGIN not set, client origin will not be checked"),
    }
    if config.bootstrap_registration {
        tracing::warn!("Bootstrap registration enabled while no passkey is stored");
    }

    let backend = CredentialBackend::connect(
        config.database_url.as_deref(),
        config.database_max_connections,
    )
    .await?;

    let state = AppState::new(backend, relying_party, &config);
    let app = create_router_with_state(&config, state);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Passkey server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
