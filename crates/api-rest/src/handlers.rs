//! Request handlers.

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use api_shared::{
    validate_api_key, CreatedRes, EncounterBundleRes, EncounterReq, ErrorRes, HealthRes,
    HealthService, MappingRes, ResolveRes, SearchHitRes, SearchQuery, API_KEY_HEADER,
    PRACTITIONER_REF_HEADER,
};
use axum::{
    extract::{rejection::QueryRejection, Path as AxumPath, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use namaste_core::CodeSystem;

/// Content type for stored Bundle documents.
pub const FHIR_JSON: &str = "application/fhir+json";

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn require_api_key(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    let expected = state
        .api_key
        .as_deref()
        .ok_or(ApiError::ApiKeyNotConfigured)?;
    validate_api_key(expected, header_value(headers, API_KEY_HEADER))?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API.
///
/// Reports liveness and the size of the loaded terminology index.
#[axum::debug_handler]
pub async fn health(State(state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health(state.service.index()))
}

#[utoipa::path(
    get,
    path = "/terminology/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Ranked matches", body = [SearchHitRes]),
        (status = 400, description = "Unknown code system", body = ErrorRes)
    )
)]
/// Search NAMASTE and/or ICD-11 display names and synonyms.
///
/// With `system`, searches that code system only; without it, merges both.
#[axum::debug_handler]
pub async fn search_terminology(
    State(state): State<AppState>,
    params: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<SearchHitRes>>> {
    // `limit` is the only parameter that is not free text.
    let Query(params) = params.map_err(|rejection| ApiError::Body {
        field: "limit".into(),
        message: rejection.body_text(),
    })?;
    let limit = Some(state.service.search_limit(params.limit));
    let hits = match params.system.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(system) => {
            let system: CodeSystem = system.parse()?;
            state.service.index().search(system, &params.query, limit)
        }
        None => state.service.resolver().suggest(&params.query, limit),
    };
    Ok(Json(hits.iter().map(SearchHitRes::from).collect()))
}

#[utoipa::path(
    get,
    path = "/terminology/resolve/{code}",
    params(("code" = String, Path, description = "NAMASTE code")),
    responses(
        (status = 200, description = "Best ICD-11 mapping, or unmapped", body = ResolveRes),
        (status = 404, description = "Unknown NAMASTE code", body = ErrorRes)
    )
)]
/// Resolve a NAMASTE code to its best ICD-11 mapping.
#[axum::debug_handler]
pub async fn resolve_code(
    State(state): State<AppState>,
    AxumPath(code): AxumPath<String>,
) -> ApiResult<Json<ResolveRes>> {
    state.service.index().lookup(CodeSystem::Namaste, &code)?;
    let resolution = state.service.resolver().resolve(&code);
    Ok(Json(ResolveRes::from(&resolution)))
}

#[utoipa::path(
    get,
    path = "/terminology/candidates/{code}",
    params(("code" = String, Path, description = "NAMASTE code")),
    responses(
        (status = 200, description = "Mapped ICD-11 codes, best first", body = [MappingRes]),
        (status = 404, description = "Unknown NAMASTE code", body = ErrorRes)
    )
)]
/// List every mapped ICD-11 candidate for a NAMASTE code.
#[axum::debug_handler]
pub async fn list_candidates(
    State(state): State<AppState>,
    AxumPath(code): AxumPath<String>,
) -> ApiResult<Json<Vec<MappingRes>>> {
    state.service.index().lookup(CodeSystem::Namaste, &code)?;
    let candidates = state.service.resolver().candidates(&code);
    Ok(Json(candidates.iter().map(MappingRes::from).collect()))
}

#[utoipa::path(
    post,
    path = "/encounters/bundle",
    request_body = EncounterReq,
    params(
        ("x-api-key" = String, Header, description = "API key"),
        ("x-practitioner-ref" = String, Header, description = "Authenticated practitioner")
    ),
    responses(
        (status = 201, description = "Bundle built and stored", body = EncounterBundleRes),
        (status = 400, description = "Invalid encounter", body = ErrorRes),
        (status = 401, description = "Missing or invalid credentials", body = ErrorRes),
        (status = 409, description = "Bundle already exists", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Assemble an encounter from doctor input, build its FHIR document and store it.
#[axum::debug_handler]
pub async fn create_encounter_bundle(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<(StatusCode, Json<EncounterBundleRes>)> {
    require_api_key(&state, &headers)?;
    let practitioner_ref = header_value(&headers, PRACTITIONER_REF_HEADER)
        .ok_or(ApiError::MissingHeader(PRACTITIONER_REF_HEADER))?
        .to_owned();

    let req: EncounterReq = parse_json_body(&body)?;
    let request = req.into_core(&practitioner_ref);

    let service = state.service.clone();
    let submitted =
        tokio::task::spawn_blocking(move || service.submit_encounter(&request)).await??;

    Ok((
        StatusCode::CREATED,
        Json(EncounterBundleRes {
            id: submitted.id,
            status: "created".into(),
            incomplete_diagnoses: submitted.incomplete_diagnoses,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/bundles/upload",
    request_body(content = String, description = "FHIR Bundle JSON", content_type = "application/json"),
    params(("x-api-key" = String, Header, description = "API key")),
    responses(
        (status = 201, description = "Bundle stored", body = CreatedRes),
        (status = 400, description = "First integrity or schema violation", body = ErrorRes),
        (status = 401, description = "Missing or invalid API key", body = ErrorRes),
        (status = 409, description = "Bundle id already exists", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Validate and store a FHIR Bundle.
#[axum::debug_handler]
pub async fn upload_bundle(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<(StatusCode, Json<CreatedRes>)> {
    require_api_key(&state, &headers)?;

    let store = state.service.store().clone();
    let id = tokio::task::spawn_blocking(move || store.upload_json(&body)).await??;

    Ok((StatusCode::CREATED, Json(CreatedRes::created(id))))
}

#[utoipa::path(
    get,
    path = "/bundles/{id}",
    params(
        ("id" = String, Path, description = "Bundle id"),
        ("x-api-key" = String, Header, description = "API key")
    ),
    responses(
        (status = 200, description = "The stored Bundle document", content_type = "application/fhir+json"),
        (status = 401, description = "Missing or invalid API key", body = ErrorRes),
        (status = 404, description = "No such bundle", body = ErrorRes)
    )
)]
/// Fetch a stored Bundle exactly as it was stored.
#[axum::debug_handler]
pub async fn get_bundle(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<impl IntoResponse> {
    require_api_key(&state, &headers)?;

    let store = state.service.store().clone();
    let json = tokio::task::spawn_blocking(move || store.get_json(&id)).await??;

    Ok(([(header::CONTENT_TYPE, FHIR_JSON)], json))
}

fn parse_json_body<T: serde::de::DeserializeOwned>(body: &str) -> ApiResult<T> {
    let mut deserializer = serde_json::Deserializer::from_str(body);
    let parsed = serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
        let path = err.path().to_string();
        ApiError::Body {
            field: if path.is_empty() || path == "." {
                "<root>".into()
            } else {
                path
            },
            message: err.into_inner().to_string(),
        }
    })?;
    deserializer.end().map_err(|e| ApiError::Body {
        field: "<root>".into(),
        message: e.to_string(),
    })?;
    Ok(parsed)
}

