//! API and Durable Data Models
//!
//! This module defines the session record that is persisted by the store, the
//! in-memory interaction trace, and the payload/response types used for
//! generating OpenAPI documentation with `utoipa`. Wire names are camelCase
//! throughout to match the connection protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sparring_core::persona::{Persona, Scenario};
use sparring_core::scoring::Feedback;
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

/// One scored agent turn plus the client reply it produced.
///
/// An exchange is only ever written as a complete unit: the score and the
/// client reply are both known before it is appended. `client_message` is
/// `None` only for a synthetic opening turn.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    pub agent_message: String,
    pub agent_score: u8,
    pub feedback: Feedback,
    pub client_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// The durable record of one coaching session.
///
/// `persona` and `scenario` are value snapshots taken at creation; later
/// template edits never alter this record. `exchanges` is append-only, and
/// once `status` is `Completed` the record is frozen apart from the
/// recording flag.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub agent_name: String,
    pub persona: Persona,
    pub scenario: Scenario,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub exchanges: Vec<Exchange>,
    pub final_score: Option<f64>,
    pub status: SessionStatus,
    pub has_recording: bool,
    pub recording_url: Option<String>,
}

/// One entry in the live in-memory conversation trace.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
#[serde(tag = "speaker", rename_all = "camelCase")]
pub enum Interaction {
    Agent {
        text: String,
        score: u8,
        timestamp: DateTime<Utc>,
    },
    Client {
        text: String,
        timestamp: DateTime<Utc>,
    },
}

/// The summary pushed to the connection when a session ends.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub agent_name: String,
    pub persona_id: String,
    pub duration_ms: i64,
    pub final_score: f64,
    pub total_interactions: u32,
    pub interactions: Vec<Interaction>,
    #[schema(value_type = String, format = Uuid)]
    pub session_id: Uuid,
}

/// Aggregate numbers for one persona or scenario group.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    pub count: usize,
    pub average_score: f64,
}

/// Aggregate statistics over completed sessions.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_sessions: usize,
    pub average_score: f64,
    pub average_duration_ms: f64,
    pub persona_breakdown: HashMap<String, GroupStats>,
    pub scenario_breakdown: HashMap<String, GroupStats>,
}

/// Payload for the recording collaborator's narrow flag update.
#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SetRecordingPayload {
    pub has_recording: bool,
    #[serde(default)]
    pub recording_url: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}
