//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ErrorResponse, Exchange, GroupStats, HealthResponse, Interaction, Session, SessionReport,
        SessionStats, SessionStatus, SetRecordingPayload,
    },
    state::AppState,
    ws::ws_handler,
};
use sparring_core::persona::{Persona, Scenario};
use sparring_core::scoring::{Feedback, FeedbackLevel};

use axum::{
    Router,
    routing::{get, patch},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::list_personas,
        handlers::list_scenarios,
        handlers::session_history,
        handlers::global_stats,
        handlers::get_session,
        handlers::agent_sessions,
        handlers::agent_stats,
        handlers::set_recording,
    ),
    components(
        schemas(
            Session,
            SessionStatus,
            Exchange,
            Interaction,
            SessionReport,
            SessionStats,
            GroupStats,
            SetRecordingPayload,
            Persona,
            Scenario,
            Feedback,
            FeedbackLevel,
            ErrorResponse,
            HealthResponse,
        )
    ),
    tags(
        (name = "Sparring API", description = "Session tracking for the customer-service coaching simulator")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/personas", get(handlers::list_personas))
        .route("/api/scenarios", get(handlers::list_scenarios))
        .route("/api/sessions/history", get(handlers::session_history))
        .route("/api/sessions/stats", get(handlers::global_stats))
        .route("/api/sessions/agent/{name}", get(handlers::agent_sessions))
        .route(
            "/api/sessions/agent/{name}/stats",
            get(handlers::agent_stats),
        )
        .route("/api/sessions/{id}", get(handlers::get_session))
        .route("/api/sessions/{id}/recording", patch(handlers::set_recording))
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
