//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! Useful during development when only the HTTP boundary is needed. The workspace's main
//! `ferry-run` binary serves the same router.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use ferry_core::config::{core_config_from_env_values, rest_addr_from_env_value};
use ferry_core::constants::{EXTENSION_BASE_URL_ENV, REST_ADDR_ENV, SESSION_TIMEOUT_MS_ENV};

/// Main entry point for the Ferry REST API server
///
/// # Environment Variables
/// - `FERRY_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `FERRY_EXTENSION_BASE_URL`: Base URL for extension definitions
/// - `FERRY_SESSION_TIMEOUT_MS`: Per-request transcoding deadline (default: 5000)
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = rest_addr_from_env_value(std::env::var(REST_ADDR_ENV).ok())?;
    let cfg = core_config_from_env_values(
        std::env::var(EXTENSION_BASE_URL_ENV).ok(),
        std::env::var(SESSION_TIMEOUT_MS_ENV).ok(),
    )?;

    tracing::info!("-- Starting Ferry REST API on {}", addr);

    let app = router(AppState::new(cfg)?);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
