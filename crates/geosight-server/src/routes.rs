//! HTTP routes and handlers

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use geosight_core::{ClassificationResponse, ErrorResponse};
use serde::{Deserialize, Serialize};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::state::AppState;

/// Error body for JSON requests without an `image_bytes` field
pub const MISSING_IMAGE_MESSAGE: &str = "No image found";

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.server.max_body_bytes;

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/classify", post(classify_json))
        .route("/v1/classify", post(classify_raw))
        .fallback(fallback)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

/// Event-style request: the image as an array of byte values
#[derive(Debug, Serialize, Deserialize)]
pub struct ClassifyRequest {
    #[serde(default)]
    pub image_bytes: Option<Vec<u8>>,
}

/// `POST /classify` with `{"image_bytes": [...]}`
async fn classify_json(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ClassificationResponse>, AppError> {
    let request: ClassifyRequest = serde_json::from_slice(&body)?;
    let image = request.image_bytes.ok_or(AppError::MissingImage)?;

    run_classification(&state, image).await
}

/// `POST /v1/classify` with the encoded image as the raw body
async fn classify_raw(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ClassificationResponse>, AppError> {
    run_classification(&state, body.to_vec()).await
}

async fn run_classification(
    state: &AppState,
    image: Vec<u8>,
) -> Result<Json<ClassificationResponse>, AppError> {
    let request_id = Uuid::new_v4();
    metrics::counter!("geosight_requests_total").increment(1);
    info!(%request_id, bytes = image.len(), "Received classification request");

    let service = state.service.clone();
    let span = info_span!("request", %request_id);

    // CPU-bound; keep it off the async workers
    let outcome = tokio::task::spawn_blocking(move || {
        let _enter = span.enter();
        service.classify(&image)
    })
    .await
    .map_err(|e| AppError::Internal(format!("classification task failed: {}", e)))?;

    let result = outcome?;

    metrics::counter!("geosight_predictions_total", "class" => result.label.as_str()).increment(1);
    metrics::histogram!("geosight_pipeline_latency_us").record(result.latency_us as f64);

    Ok(Json(result.to_response()))
}

async fn fallback() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}

/// Error handling
#[derive(Debug)]
pub enum AppError {
    /// JSON body without `image_bytes`
    MissingImage,
    /// Body is not the expected JSON
    InvalidRequest(String),
    /// Pipeline failure
    Classification(geosight_core::Error),
    /// Anything outside the pipeline, such as a failed blocking task
    Internal(String),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::MissingImage => "input",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Classification(e) => e.kind(),
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<geosight_core::Error> for AppError {
    fn from(err: geosight_core::Error) -> Self {
        AppError::Classification(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidRequest(format!("Invalid JSON body: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        metrics::counter!("geosight_errors_total", "kind" => self.kind()).increment(1);

        let (status, body) = match self {
            AppError::MissingImage => {
                warn!("Request body has no image_bytes field");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new(MISSING_IMAGE_MESSAGE),
                )
            }
            AppError::InvalidRequest(msg) => {
                warn!("{}", msg);
                (StatusCode::BAD_REQUEST, ErrorResponse::new(msg))
            }
            AppError::Classification(err) => {
                let status = if err.is_caller_fault() {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, ErrorResponse::from(&err))
            }
            AppError::Internal(msg) => {
                error!("{}", msg);
                let err = geosight_core::Error::internal(msg);
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::from(&err))
            }
        };

        (status, Json(body)).into_response()
    }
}
