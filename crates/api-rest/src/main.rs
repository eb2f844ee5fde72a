//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own. The workspace's `namaste-run` binary serves the same
//! router; this one is handy when iterating on the API alone.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{core_config_from_env, router, AppState};
use namaste_core::DiagnosisService;

/// Main entry point for the NAMASTE REST API server.
///
/// # Environment Variables
/// - `NAMASTE_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `BUNDLE_DATA_DIR`: Bundle storage directory, created if missing (default: "bundle_data")
/// - `TERMINOLOGY_FILE`: YAML or JSON terminology table (default: embedded seed table)
/// - `SEARCH_DEFAULT_LIMIT`: Search results when no limit is given (default: 20)
/// - `API_KEY`: Key required on encounter and bundle routes
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration or terminology table is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("namaste_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("NAMASTE_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = Arc::new(core_config_from_env()?);
    std::fs::create_dir_all(cfg.bundle_data_dir())?;
    let service = DiagnosisService::from_config(cfg)?;

    let api_key = std::env::var("API_KEY").ok();
    let state = AppState::new(service, api_key);
    if !state.has_api_key() {
        tracing::warn!("API_KEY is not set; encounter and bundle routes will fail");
    }

    let app = router(state);

    tracing::info!("-- Starting NAMASTE REST API on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
