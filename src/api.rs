//! Classification service for the split deployment.
//!
//! Endpoints:
//! - POST /classify - Classify one journal entry
//! - GET /health - Health check

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::classifier::{EmotionClassifier, TextLimits};
use crate::error::JournalError;
use crate::models::Prediction;

pub const MODEL_NOT_LOADED: &str = "Classifier model not loaded.";
pub const CLASSIFICATION_FAILED: &str = "Classification failed.";

pub struct AppState {
    pub classifier: Option<Arc<dyn EmotionClassifier>>,
    pub limits: TextLimits,
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model_loaded: bool,
}

/// Error body in the `{"detail": ...}` shape clients expect.
pub enum ApiError {
    Validation(Vec<String>),
    ModelNotLoaded,
    ClassificationFailed,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(vec![rejection.body_text()])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(messages) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "detail": messages })),
            )
                .into_response(),
            ApiError::ModelNotLoaded => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": MODEL_NOT_LOADED })),
            )
                .into_response(),
            ApiError::ClassificationFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": CLASSIFICATION_FAILED })),
            )
                .into_response(),
        }
    }
}

pub fn create_router(classifier: Option<Arc<dyn EmotionClassifier>>, limits: TextLimits) -> Router {
    let state = Arc::new(AppState { classifier, limits });

    Router::new()
        .route("/health", get(health))
        .route("/classify", post(classify))
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        model_loaded: state.classifier.is_some(),
    })
}

async fn classify(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ClassifyRequest>, JsonRejection>,
) -> Result<Json<Prediction>, ApiError> {
    let Json(req) = payload.inspect_err(|rejection| {
        tracing::info!(status = %rejection.status(), "rejected malformed classification body");
    })?;
    let problems = state.limits.check(&req.text);
    if !problems.is_empty() {
        tracing::info!(violations = problems.len(), "rejected classification request");
        return Err(ApiError::Validation(problems));
    }

    let classifier = state.classifier.as_ref().ok_or_else(|| {
        tracing::error!("classification requested but no model backend is configured");
        ApiError::ModelNotLoaded
    })?;

    match classifier.classify(&req.text).await {
        Ok(prediction) => Ok(Json(prediction)),
        Err(JournalError::ValidationFailed(messages)) => Err(ApiError::Validation(messages)),
        Err(err) => {
            tracing::error!(error = %err, kind = err.kind(), "classification failed");
            Err(ApiError::ClassificationFailed)
        }
    }
}

/// Run the classification service
pub async fn run_server(
    addr: &str,
    classifier: Option<Arc<dyn EmotionClassifier>>,
    limits: TextLimits,
) -> anyhow::Result<()> {
    let router = create_router(classifier, limits);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "classification service listening");
    axum::serve(listener, router).await?;
    Ok(())
}
