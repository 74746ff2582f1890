use crate::config::{Config, Provider};
use crate::gateway::{user_prompt, ModelGateway, ProviderError, SYSTEM_PROMPT};
use crate::models::{
    AnalyzeRequest, DataResponse, ErrorResponse, ImagePolicy, InvalidInput, ListingReport,
};
use crate::normalizer::{normalize, ExtractionFailure};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn ModelGateway>,
    pub policy: ImagePolicy,
    pub default_mime_type: String,
    pub request_timeout: Duration,
    pub provider: Provider,
    pub model_name: String,
}

impl AppState {
    pub fn new(config: &Config, gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            gateway,
            policy: config.image_policy(),
            default_mime_type: config.default_mime_type.clone(),
            request_timeout: config.request_timeout(),
            provider: config.llm_provider,
            model_name: config.llm_model_name.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInput),
    #[error("provider failure: {0}")]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Extraction(#[from] ExtractionFailure),
}

impl IntoResponse for AnalyzeError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AnalyzeError::InvalidInput(e) => {
                (StatusCode::BAD_REQUEST, ErrorResponse::new(e.to_string()))
            }
            AnalyzeError::Provider(e) if e.is_timeout() => (
                StatusCode::GATEWAY_TIMEOUT,
                ErrorResponse::new("model provider timed out").with_message(e.message()),
            ),
            AnalyzeError::Provider(e) => (
                StatusCode::BAD_GATEWAY,
                ErrorResponse::new("model provider error").with_message(e.message()),
            ),
            AnalyzeError::Extraction(e) => (
                StatusCode::BAD_GATEWAY,
                ErrorResponse::new("could not parse model output")
                    .with_message(e.to_string())
                    .with_raw(e.raw_preview),
            ),
        };

        (status, Json(body)).into_response()
    }
}

#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn analyze_listing(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<DataResponse<ListingReport>>, AnalyzeError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected malformed request body: {}", rejection.body_text());
        InvalidInput::MalformedBody(rejection.body_text())
    })?;

    let decoded = request
        .decode(&state.policy, &state.default_mime_type)
        .map_err(|e| {
            warn!("Rejected analyze request: {}", e);
            e
        })?;

    info!(
        "Analyzing listing with {} image(s) ({})",
        decoded.images.len(),
        decoded.mime_type
    );

    let raw = tokio::time::timeout(
        state.request_timeout,
        state.gateway.invoke(
            &decoded.images,
            &decoded.mime_type,
            SYSTEM_PROMPT,
            &user_prompt(decoded.images.len()),
        ),
    )
    .await
    .map_err(|_| {
        error!("Model call exceeded {:?}", state.request_timeout);
        ProviderError::Timeout
    })?
    .map_err(|e| {
        error!("Model call failed: {}", e);
        e
    })?;

    debug!("Model returned {} chars", raw.chars().count());

    let report = normalize(&raw)?;
    info!("Listing report ready, lens score {}", report.lens_score);

    Ok(Json(DataResponse { data: report }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub provider: String,
    pub model: String,
    pub max_images: usize,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    debug!("Health check requested");

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        provider: state.provider.to_string(),
        model: state.model_name.clone(),
        max_images: state.policy.max_images,
    })
}

pub async fn handle_404() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(
            ErrorResponse::new("endpoint not found")
                .with_message("available endpoints: POST /analyze, GET /health"),
        ),
    )
}
