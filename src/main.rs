use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use ferry_core::config::{core_config_from_env_values, rest_addr_from_env_value};
use ferry_core::constants::{EXTENSION_BASE_URL_ENV, REST_ADDR_ENV, SESSION_TIMEOUT_MS_ENV};
use ferry_core::registry;

/// Main entry point for the Ferry application
///
/// Resolves configuration once, logs the registered adapters and serves the REST API.
///
/// # Environment Variables
/// - `FERRY_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `FERRY_EXTENSION_BASE_URL`: Base URL for extension definitions
/// - `FERRY_SESSION_TIMEOUT_MS`: Per-request transcoding deadline (default: 5000)
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ferry=info".parse()?)
                .add_directive("ferry_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr: SocketAddr = rest_addr_from_env_value(std::env::var(REST_ADDR_ENV).ok())?;
    let cfg = core_config_from_env_values(
        std::env::var(EXTENSION_BASE_URL_ENV).ok(),
        std::env::var(SESSION_TIMEOUT_MS_ENV).ok(),
    )?;

    for adapter in registry(&cfg)? {
        tracing::info!("++ Adapter {} ({} rules)", adapter.name(), adapter.rules().len());
    }
    tracing::info!("++ Starting Ferry REST on {}", rest_addr);

    let rest_app = router(AppState::new(cfg)?);
    let rest_server = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(rest_addr).await?;
        axum::serve(listener, rest_app).await
    });

    rest_server.await??;
    Ok(())
}
