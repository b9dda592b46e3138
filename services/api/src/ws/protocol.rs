//! Defines the WebSocket message protocol between the trainee client and the
//! server. Event and field names are camelCase on the wire.

use crate::models::SessionReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sparring_core::persona::{Persona, Scenario};
use sparring_core::scoring::Feedback;
use uuid::Uuid;

/// How the caller picks a persona and scenario: by template id, or by
/// supplying raw override objects directly.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct StartSessionPayload {
    /// Display identity of the trainee; defaults to an anonymous label.
    pub agent_name: Option<String>,
    pub persona_id: Option<String>,
    pub scenario_id: Option<String>,
    /// Raw persona override; wins over `persona_id` when present.
    pub persona: Option<Persona>,
    /// Raw scenario override; wins over `scenario_id` when present.
    pub scenario: Option<Scenario>,
}

/// Messages sent from the client (trainee UI) to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Begins a coaching session on this connection.
    StartSession(StartSessionPayload),
    /// The agent's utterance for this turn.
    AgentResponse { transcript: String },
    /// Ends the session and requests the final report.
    EndSession,
}

/// Messages sent from the server to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Confirms the session and echoes the resolved templates.
    SessionStarted {
        session_id: Uuid,
        persona: Persona,
        scenario: Scenario,
    },
    /// The simulated client's next utterance.
    ClientSpeaking {
        message: String,
        persona_id: String,
        timestamp: DateTime<Utc>,
    },
    /// Per-turn score plus the running session aggregate.
    ScoreUpdate {
        interaction_score: u8,
        overall_score: f64,
        feedback: Feedback,
        total_interactions: u32,
    },
    /// The end-of-session summary.
    SessionReport {
        #[serde(flatten)]
        report: SessionReport,
    },
    /// Reports an unexpected orchestration failure to the client.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Interaction;
    use sparring_core::persona::{default_personas, default_scenarios};
    use sparring_core::scoring::feedback_for;

    #[test]
    fn start_session_parses_selector_form() {
        let json = r#"{
            "type": "startSession",
            "agentName": "casey",
            "personaId": "angry",
            "scenarioId": "brake_repair"
        }"#;
        match serde_json::from_str::<ClientMessage>(json).unwrap() {
            ClientMessage::StartSession(payload) => {
                assert_eq!(payload.agent_name.as_deref(), Some("casey"));
                assert_eq!(payload.persona_id.as_deref(), Some("angry"));
                assert_eq!(payload.scenario_id.as_deref(), Some("brake_repair"));
                assert!(payload.persona.is_none());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn start_session_parses_raw_override_form() {
        let json = r#"{
            "type": "startSession",
            "persona": {"id": "custom", "name": "Custom", "description": "d", "traits": []}
        }"#;
        match serde_json::from_str::<ClientMessage>(json).unwrap() {
            ClientMessage::StartSession(payload) => {
                assert_eq!(payload.persona.unwrap().id, "custom");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn agent_response_and_end_session_parse() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"agentResponse","transcript":"Hi there"}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::AgentResponse { ref transcript } if transcript == "Hi there"
        ));

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"endSession"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::EndSession));
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"reboot"}"#).is_err());
    }

    #[test]
    fn score_update_serializes_camel_case() {
        let msg = ServerMessage::ScoreUpdate {
            interaction_score: 2,
            overall_score: 2.5,
            feedback: feedback_for(2),
            total_interactions: 4,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"scoreUpdate\""));
        assert!(json.contains("\"interactionScore\":2"));
        assert!(json.contains("\"totalInteractions\":4"));
    }

    #[test]
    fn session_report_flattens_into_the_event() {
        let msg = ServerMessage::SessionReport {
            report: SessionReport {
                agent_name: "casey".into(),
                persona_id: "angry".into(),
                duration_ms: 90_000,
                final_score: 2.0,
                total_interactions: 3,
                interactions: vec![Interaction::Client {
                    text: "Hello!".into(),
                    timestamp: Utc::now(),
                }],
                session_id: Uuid::new_v4(),
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"sessionReport\""));
        // Report fields sit at the top level of the event payload.
        assert!(json.contains("\"agentName\":\"casey\""));
        assert!(json.contains("\"finalScore\":2.0"));
    }

    #[test]
    fn session_started_echoes_resolved_templates() {
        let msg = ServerMessage::SessionStarted {
            session_id: Uuid::new_v4(),
            persona: default_personas().swap_remove(2),
            scenario: default_scenarios().swap_remove(0),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"sessionStarted\""));
        assert!(json.contains("Angry Customer"));
        assert!(json.contains("Brake Repair"));
    }
}
