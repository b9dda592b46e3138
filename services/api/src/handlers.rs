//! Axum Handlers for the REST API
//!
//! Read-only views over the session store, the template listings consumed by
//! the trainee UI, and the recording collaborator's flag update. Handlers use
//! `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Deserialize;
use sparring_core::catalog::TemplateSet;
use sparring_core::persona::{Persona, Scenario, default_personas, default_scenarios};
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    models::{ErrorResponse, HealthResponse, Session, SessionStats, SetRecordingPayload},
    state::AppState,
};

pub enum ApiError {
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Templates with the catalog's failure swallowed: a broken catalog must not
/// take the listing endpoints down, so they fall open to the built-ins.
async fn resolve_templates(state: &AppState) -> TemplateSet {
    match state.catalog.templates().await {
        Ok(set) => set,
        Err(e) => {
            warn!(error = ?e, "template catalog unavailable, serving built-in defaults");
            TemplateSet {
                personas: default_personas(),
                scenarios: default_scenarios(),
            }
        }
    }
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: Utc::now(),
    })
}

/// List the personas available for new sessions.
#[utoipa::path(
    get,
    path = "/api/personas",
    responses((status = 200, description = "Available personas", body = [Persona]))
)]
pub async fn list_personas(State(state): State<Arc<AppState>>) -> Json<Vec<Persona>> {
    Json(resolve_templates(&state).await.personas)
}

/// List the scenarios available for new sessions.
#[utoipa::path(
    get,
    path = "/api/scenarios",
    responses((status = 200, description = "Available scenarios", body = [Scenario]))
)]
pub async fn list_scenarios(State(state): State<Arc<AppState>>) -> Json<Vec<Scenario>> {
    Json(resolve_templates(&state).await.scenarios)
}

#[derive(Deserialize, IntoParams)]
pub struct HistoryParams {
    /// Maximum number of sessions to return (default 50).
    pub limit: Option<usize>,
}

/// Session history, newest start time first.
#[utoipa::path(
    get,
    path = "/api/sessions/history",
    params(HistoryParams),
    responses((status = 200, description = "Recent sessions", body = [Session]))
)]
pub async fn session_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Json<Vec<Session>> {
    Json(state.store.history(params.limit.unwrap_or(50)).await)
}

/// Aggregate statistics over all completed sessions.
#[utoipa::path(
    get,
    path = "/api/sessions/stats",
    responses((status = 200, description = "Global session statistics", body = SessionStats))
)]
pub async fn global_stats(State(state): State<Arc<AppState>>) -> Json<SessionStats> {
    Json(state.store.stats_global().await)
}

/// Fetch a single session by its ID.
#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session record", body = Session),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Session>, ApiError> {
    let session = state
        .store
        .get(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Session with id '{id}' not found")))?;
    Ok(Json(session))
}

/// List one agent's sessions, newest first.
#[utoipa::path(
    get,
    path = "/api/sessions/agent/{name}",
    params(("name" = String, Path, description = "Agent identity")),
    responses((status = 200, description = "The agent's sessions", body = [Session]))
)]
pub async fn agent_sessions(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Json<Vec<Session>> {
    Json(state.store.sessions_for_agent(&name).await)
}

/// Aggregate statistics for one agent's completed sessions.
#[utoipa::path(
    get,
    path = "/api/sessions/agent/{name}/stats",
    params(("name" = String, Path, description = "Agent identity")),
    responses((status = 200, description = "The agent's statistics", body = SessionStats))
)]
pub async fn agent_stats(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Json<SessionStats> {
    Json(state.store.stats_for_agent(&name).await)
}

/// Set or clear a session's recording flag and locator.
///
/// Invoked by the recording-management collaborator after it stores or
/// deletes the audio; deliberately narrow, leaving exchanges and scores
/// untouched.
#[utoipa::path(
    patch,
    path = "/api/sessions/{id}/recording",
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = SetRecordingPayload,
    responses(
        (status = 200, description = "Updated session record", body = Session),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn set_recording(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetRecordingPayload>,
) -> Result<Json<Session>, ApiError> {
    let updated = state
        .store
        .set_recording(id, payload.has_recording, payload.recording_url)
        .await;
    if !updated {
        return Err(ApiError::NotFound(format!(
            "Session with id '{id}' not found"
        )));
    }
    let session = state
        .store
        .get(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Session with id '{id}' not found")))?;
    Ok(Json(session))
}
