//! HTTP API for tabvault
//!
//! ## Endpoint Map
//!
//! | Method | Path                   | Description                              |
//! |--------|------------------------|------------------------------------------|
//! | GET    | `/health`              | Liveness, backend, stored entry count    |
//! | POST   | `/process_ai_data`     | Ingest model JSON, returns the data ID   |
//! | GET    | `/fetch_data/:data_id` | CSV attachment, or `?format=json` records |
//!
//! Errors are returned as `{"error": {"code": "...", "message": "..."}}`
//! with a status per error kind.

use crate::error::Error;
use crate::render::{OutputFormat, Rendered};
use crate::service::TableService;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<TableService>,
    /// Base URL used to build `fetch_endpoint` links
    pub public_base_url: String,
}

/// Build the complete HTTP application
pub fn build_app(state: ApiState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/process_ai_data", post(process_ai_data))
        .route("/fetch_data/:data_id", get(fetch_data))
        .with_state(state)
        .layer(build_cors(cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(parsed)
}

// =============================================================================
// Error responses
// =============================================================================

#[derive(Debug, Serialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Serialize)]
struct ApiErrorDetail {
    code: &'static str,
    message: String,
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Parse { .. } => StatusCode::BAD_REQUEST,
        Error::Shape(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::NotFound => StatusCode::NOT_FOUND,
        Error::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Transcode(_) | Error::Config(_) | Error::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(status: StatusCode, code: &'static str, message: String) -> Response {
    (
        status,
        Json(ApiError {
            error: ApiErrorDetail { code, message },
        }),
    )
        .into_response()
}

/// Request bodies axum could not decode get the same envelope as domain errors
fn rejection_response(rejection: JsonRejection) -> Response {
    tracing::debug!(error = %rejection.body_text(), "Rejected request body");
    error_response(rejection.status(), "INVALID_REQUEST", rejection.body_text())
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }
        let message = match &self {
            Error::NotFound => {
                "Data ID (key) not found or has expired. Please run the generation again."
                    .to_string()
            }
            other => other.to_string(),
        };
        error_response(status, self.code(), message)
    }
}

// =============================================================================
// Handlers
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    backend: String,
    stored_entries: Option<usize>,
}

/// GET /health
async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    let store = state.service.store();
    let stored_entries = match store.stored_count().await {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not count entries");
            None
        }
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: store.backend().to_string(),
        stored_entries,
    })
}

/// Request body for ingestion
#[derive(Debug, Deserialize)]
pub struct DataPayload {
    #[serde(default)]
    pub json_data_string: Option<String>,
}

/// Response for a stored artifact
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub status: String,
    pub message: String,
    pub data_id: String,
    pub fetch_endpoint: String,
    pub column_count: usize,
    pub row_count: usize,
}

/// POST /process_ai_data
async fn process_ai_data(
    State(state): State<ApiState>,
    payload: Result<Json<DataPayload>, JsonRejection>,
) -> Result<Json<ProcessResponse>, Response> {
    let Json(payload) = payload.map_err(rejection_response)?;
    let raw = payload.json_data_string.as_deref().unwrap_or_default();
    let receipt = state
        .service
        .ingest(raw)
        .await
        .map_err(IntoResponse::into_response)?;

    let fetch_endpoint = format!(
        "{}/fetch_data/{}",
        state.public_base_url.trim_end_matches('/'),
        receipt.key
    );

    Ok(Json(ProcessResponse {
        status: "success".to_string(),
        message: "Data successfully processed and stored.".to_string(),
        data_id: receipt.key,
        fetch_endpoint,
        column_count: receipt.column_count,
        row_count: receipt.row_count,
    }))
}

#[derive(Debug, Deserialize)]
struct FetchQuery {
    format: Option<String>,
}

/// GET /fetch_data/:data_id
async fn fetch_data(
    State(state): State<ApiState>,
    Path(data_id): Path<String>,
    Query(query): Query<FetchQuery>,
) -> Result<Response, Error> {
    let format = query
        .format
        .as_deref()
        .map(OutputFormat::parse)
        .unwrap_or_default();

    let response = match state.service.retrieve(&data_id, format).await? {
        Rendered::Csv(body) => {
            let disposition = format!("attachment;filename=data_{}.csv", data_id);
            let mut response = (
                [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
                body,
            )
                .into_response();
            if let Ok(value) = HeaderValue::from_str(&disposition) {
                response
                    .headers_mut()
                    .insert(header::CONTENT_DISPOSITION, value);
            }
            response
        }
        Rendered::Records(records) => Json(records).into_response(),
    };
    Ok(response)
}
