//! # API REST
//!
//! REST API for NAMASTE terminology lookup and FHIR document submission.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (API key checks, error bodies, CORS)
//!
//! Uses `api-shared` for wire types and `namaste-core` for all behaviour.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use namaste_core::config::{
    bundle_data_dir_from_env_value, search_default_limit_from_env_value,
    terminology_file_from_env_value,
};
use namaste_core::{CoreConfig, CoreResult, DiagnosisService};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use error::{ApiError, ApiResult};

/// Application state shared across REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: DiagnosisService,
    /// Expected value of the `x-api-key` header. Protected routes answer 500 when unset.
    pub api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(service: DiagnosisService, api_key: Option<String>) -> Self {
        Self {
            service,
            api_key: api_key.filter(|k| !k.trim().is_empty()).map(Arc::from),
        }
    }

    /// Whether protected routes can authenticate callers at all.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::search_terminology,
        handlers::resolve_code,
        handlers::list_candidates,
        handlers::create_encounter_bundle,
        handlers::upload_bundle,
        handlers::get_bundle,
    ),
    components(schemas(
        api_shared::HealthRes,
        api_shared::SearchHitRes,
        api_shared::MappingRes,
        api_shared::ResolveRes,
        api_shared::DiagnosisReq,
        api_shared::PrescriptionReq,
        api_shared::EncounterReq,
        api_shared::EncounterBundleRes,
        api_shared::CreatedRes,
        api_shared::ErrorRes,
    ))
)]
pub struct ApiDoc;

/// Build the full REST router, including Swagger UI and the OpenAPI document.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/terminology/search", get(handlers::search_terminology))
        .route("/terminology/resolve/:code", get(handlers::resolve_code))
        .route("/terminology/candidates/:code", get(handlers::list_candidates))
        .route("/encounters/bundle", post(handlers::create_encounter_bundle))
        .route("/bundles/upload", post(handlers::upload_bundle))
        .route("/bundles/:id", get(handlers::get_bundle))
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Resolve [`CoreConfig`] from `BUNDLE_DATA_DIR`, `TERMINOLOGY_FILE` and `SEARCH_DEFAULT_LIMIT`.
pub fn core_config_from_env() -> CoreResult<CoreConfig> {
    CoreConfig::new(
        bundle_data_dir_from_env_value(std::env::var("BUNDLE_DATA_DIR").ok()),
        terminology_file_from_env_value(std::env::var("TERMINOLOGY_FILE").ok()),
        search_default_limit_from_env_value(std::env::var("SEARCH_DEFAULT_LIMIT").ok())?,
    )
}
