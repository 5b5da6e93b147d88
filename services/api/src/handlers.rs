//! Axum Handlers for the Tutoring Endpoints
//!
//! Each handler validates its body, delegates to the shared
//! [`TutorService`](tutor_core::tutor_service::TutorService) and maps the
//! outcome onto an HTTP status. `utoipa` doc comments feed the OpenAPI
//! document.

use axum::{
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::future::Future;
use std::sync::Arc;
use tracing::{Instrument, error, info, info_span, warn};
use tutor_core::{
    TutorError,
    endpoint::{AnalyzeRequest, Endpoint, ErrorBody, SchemaRequest, TeachRequest, TeachingEndpoint},
    types::{AnalysisResult, DiagramResult, TeachingResult},
};
use uuid::Uuid;

use crate::state::AppState;

pub enum ApiError {
    BadRequest(String),
    /// No model credential is configured.
    ServiceUnavailable(String),
    /// The model call or its output failed; `label` names the endpoint's work.
    Upstream { label: &'static str, message: String },
}

impl ApiError {
    pub fn from_tutor(endpoint: Endpoint, err: TutorError) -> Self {
        match err {
            TutorError::Validation(message) => ApiError::BadRequest(message),
            TutorError::Configuration(message) => ApiError::ServiceUnavailable(message),
            other => ApiError::Upstream {
                label: endpoint.failure_label(),
                message: other.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(error) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error,
                    message: None,
                }),
            )
                .into_response(),
            ApiError::ServiceUnavailable(error) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorBody {
                    error,
                    message: None,
                }),
            )
                .into_response(),
            ApiError::Upstream { label, message } => {
                error!(label, %message, "Tutoring request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        error: label.to_string(),
                        message: Some(message),
                    }),
                )
                    .into_response()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Runs `call` inside a span tagged with a fresh request id.
async fn traced<T, F>(endpoint: Endpoint, call: F) -> Result<Json<T>, ApiError>
where
    F: Future<Output = tutor_core::Result<T>>,
{
    let span = info_span!("request", request_id = %Uuid::new_v4(), endpoint = endpoint.path());
    async move {
        match call.await {
            Ok(result) => {
                info!("Request completed");
                Ok(Json(result))
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "Request rejected");
                Err(ApiError::from_tutor(endpoint, e))
            }
        }
    }
    .instrument(span)
    .await
}

/// Review a piece of code against production-readiness principles.
#[utoipa::path(
    post,
    path = "/api/analyze",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Analysis of the submitted code", body = AnalysisResult),
        (status = 400, description = "Code or language missing", body = ErrorBody),
        (status = 503, description = "API key not configured", body = ErrorBody),
        (status = 500, description = "Model call failed", body = ErrorBody)
    )
)]
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let Json(request) = payload?;
    traced(Endpoint::Analyze, state.tutor.analyze(request)).await
}

/// One Socratic turn on an algorithm.
#[utoipa::path(
    post,
    path = "/api/teach",
    request_body = TeachRequest,
    responses(
        (status = 200, description = "The tutor's reply", body = TeachingResult),
        (status = 400, description = "Message missing", body = ErrorBody),
        (status = 503, description = "API key not configured", body = ErrorBody),
        (status = 500, description = "Model call failed", body = ErrorBody)
    )
)]
pub async fn teach(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TeachRequest>, JsonRejection>,
) -> Result<Json<TeachingResult>, ApiError> {
    teaching_turn(&state, TeachingEndpoint::Teach, payload).await
}

/// One turn on a probability, statistics or game theory question.
#[utoipa::path(
    post,
    path = "/api/math",
    request_body = TeachRequest,
    responses(
        (status = 200, description = "The tutor's reply", body = TeachingResult),
        (status = 400, description = "Message missing", body = ErrorBody),
        (status = 503, description = "API key not configured", body = ErrorBody),
        (status = 500, description = "Model call failed", body = ErrorBody)
    )
)]
pub async fn math(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TeachRequest>, JsonRejection>,
) -> Result<Json<TeachingResult>, ApiError> {
    teaching_turn(&state, TeachingEndpoint::Math, payload).await
}

/// One turn on a systems or infrastructure concept.
#[utoipa::path(
    post,
    path = "/api/technical",
    request_body = TeachRequest,
    responses(
        (status = 200, description = "The tutor's reply", body = TeachingResult),
        (status = 400, description = "Message missing", body = ErrorBody),
        (status = 503, description = "API key not configured", body = ErrorBody),
        (status = 500, description = "Model call failed", body = ErrorBody)
    )
)]
pub async fn technical(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TeachRequest>, JsonRejection>,
) -> Result<Json<TeachingResult>, ApiError> {
    teaching_turn(&state, TeachingEndpoint::Technical, payload).await
}

/// Generate a Mermaid or ASCII diagram.
#[utoipa::path(
    post,
    path = "/api/schema",
    request_body = SchemaRequest,
    responses(
        (status = 200, description = "The generated diagram", body = DiagramResult),
        (status = 400, description = "Schema request missing", body = ErrorBody),
        (status = 503, description = "API key not configured", body = ErrorBody),
        (status = 500, description = "Model call failed", body = ErrorBody)
    )
)]
pub async fn schema(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SchemaRequest>, JsonRejection>,
) -> Result<Json<DiagramResult>, ApiError> {
    let Json(request) = payload?;
    traced(Endpoint::Schema, state.tutor.schema(request)).await
}

async fn teaching_turn(
    state: &AppState,
    endpoint: TeachingEndpoint,
    payload: Result<Json<TeachRequest>, JsonRejection>,
) -> Result<Json<TeachingResult>, ApiError> {
    let Json(request) = payload?;
    traced(endpoint.into(), state.tutor.teach(endpoint, request)).await
}
