use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use herald_core::config::is_valid_owner_id;
use herald_core::env::{export_env, job_manifest, published_result_for};
use herald_core::error::AppError;
use herald_core::models::JobResultRecord;
use herald_core::traits::{ResultStore, ResultStoreFactory};

use crate::auth::require_api_key;
use crate::dto::{
    EnvResponse, HealthResponse, JobListResponse, RecordListResponse, RecordResponse, ResultQuery,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/owners/{owner}/records", get(list_records))
        .route("/v1/owners/{owner}/env", get(get_env))
        .route("/v1/owners/{owner}/jobs", get(list_jobs))
        .route("/v1/owners/{owner}/result", get(get_result))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

async fn load_records(state: &AppState, owner: &str) -> Result<Vec<JobResultRecord>, ApiError> {
    if !is_valid_owner_id(owner) {
        return Err(AppError::NotFound {
            url: format!("owner '{owner}'"),
        }
        .into());
    }
    let store = state.stores.open(owner)?;
    Ok(store.list().await?)
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/owners/{owner}/records",
    params(("owner" = String, Path, description = "Owner id")),
    responses(
        (status = 200, description = "Persisted records in store order", body = RecordListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Invalid owner id", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "records"
)]
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let records = load_records(&state, &owner).await?;
    let total = records.len();
    Ok(axum::Json(RecordListResponse {
        owner,
        records: records.into_iter().map(RecordResponse::from).collect(),
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/owners/{owner}/result",
    params(
        ("owner" = String, Path, description = "Owner id"),
        ResultQuery,
    ),
    responses(
        (status = 200, description = "Published result of the matching build, or an empty object"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "records"
)]
pub async fn get_result(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
    Query(query): Query<ResultQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let records = load_records(&state, &owner).await?;
    let result = published_result_for(&records, &query.build_url)
        .cloned()
        .unwrap_or_default();
    Ok(axum::Json(serde_json::Value::Object(result)))
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/owners/{owner}/env",
    params(("owner" = String, Path, description = "Owner id")),
    responses(
        (status = 200, description = "Exported environment variables", body = EnvResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "env"
)]
pub async fn get_env(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let records = load_records(&state, &owner).await?;
    Ok(axum::Json(EnvResponse {
        env: export_env(&records),
        owner,
    }))
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/owners/{owner}/jobs",
    params(("owner" = String, Path, description = "Owner id")),
    responses(
        (status = 200, description = "Remote jobs with persisted state", body = JobListResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "jobs"
)]
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let records = load_records(&state, &owner).await?;
    Ok(axum::Json(JobListResponse {
        jobs: job_manifest(&records).into_iter().map(Into::into).collect(),
        owner,
    }))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health() -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}
