use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, core_config_from_env, router};
use namaste_core::DiagnosisService;

/// Main entry point for the NAMASTE terminology service.
///
/// Loads the terminology index, opens the bundle store and serves the REST API until Ctrl-C.
///
/// # Environment Variables
/// - `NAMASTE_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `BUNDLE_DATA_DIR`: Directory for stored bundles (default: "bundle_data")
/// - `TERMINOLOGY_FILE`: YAML or JSON terminology table (default: embedded seed table)
/// - `SEARCH_DEFAULT_LIMIT`: Search results when no limit is given (default: 20)
/// - `API_KEY`: API key for encounter and bundle routes
///
/// # Returns
/// * `Ok(())` - If the server starts and shuts down cleanly
/// * `Err(anyhow::Error)` - If startup or serving fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("namaste_run=info".parse()?)
                .add_directive("namaste_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("NAMASTE_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = Arc::new(core_config_from_env()?);
    std::fs::create_dir_all(cfg.bundle_data_dir())?;
    let service = DiagnosisService::from_config(cfg)?;
    let stats = service.index().stats();
    tracing::info!(
        namaste = stats.namaste_entries,
        icd11 = stats.icd_entries,
        mappings = stats.mappings,
        "terminology index ready"
    );

    let api_key = std::env::var("API_KEY").ok();
    let state = AppState::new(service, api_key);
    if !state.has_api_key() {
        tracing::warn!("API_KEY is not set; encounter and bundle routes will fail");
    }

    let app = router(state);

    tracing::info!("++ Starting NAMASTE REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
