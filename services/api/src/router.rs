//! Axum Router Configuration
//!
//! The tutoring endpoints under `/api`, plus Swagger UI and the OpenAPI
//! document.

use crate::{handlers, state::AppState};

use axum::{Router, routing::post};
use std::sync::Arc;
use tutor_core::{
    endpoint::{AnalyzeRequest, ErrorBody, SchemaRequest, TeachRequest},
    types::{
        AnalysisResult, ConversationTurn, DiagramKind, DiagramResult, Issue, Severity,
        TeachingKind, TeachingResult, TurnRole,
    },
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::analyze,
        handlers::teach,
        handlers::math,
        handlers::technical,
        handlers::schema,
    ),
    components(
        schemas(
            AnalyzeRequest, TeachRequest, SchemaRequest, ErrorBody, ConversationTurn, TurnRole,
            AnalysisResult, Issue, Severity, TeachingResult, TeachingKind, DiagramResult, DiagramKind
        )
    ),
    tags(
        (name = "Tutor API", description = "Code analysis, Socratic teaching turns and diagram generation")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/api/analyze", post(handlers::analyze))
        .route("/api/teach", post(handlers::teach))
        .route("/api/math", post(handlers::math))
        .route("/api/technical", post(handlers::technical))
        .route("/api/schema", post(handlers::schema))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
