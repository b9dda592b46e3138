//! Session Orchestrator
//!
//! Drives the turn-taking protocol for one connection: start, repeated
//! agent/client exchanges, end or disconnect. The orchestrator owns the
//! sequencing and all fallback policy; the external generation and scoring
//! services are reached only through their trait seams and never allowed to
//! fail a session.
//!
//! Events for a single connection are handled strictly in arrival order by
//! that connection's task. Different connections proceed concurrently and
//! meet only at the registry map and the store.

use crate::models::{Exchange, Interaction, SessionReport};
use crate::registry::{ActiveSessionRegistry, ActiveSessionState};
use crate::store::SessionStore;
use crate::ws::protocol::{ServerMessage, StartSessionPayload};
use anyhow::Result;
use chrono::Utc;
use sparring_core::catalog::{TemplateCatalog, TemplateSet};
use sparring_core::dialogue::{DialogueGenerator, TurnKind, fallback_utterance};
use sparring_core::persona::{Persona, Scenario, default_personas, default_scenarios};
use sparring_core::scoring::{MAX_SCORE, ResponseScorer, feedback_for, lexical_score};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

/// Outer bound on any single external generation or scoring call. Expiry
/// counts as a collaborator failure and takes the fallback path.
const COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SessionOrchestrator {
    store: Arc<SessionStore>,
    registry: Arc<ActiveSessionRegistry>,
    generator: Arc<dyn DialogueGenerator>,
    scorer: Arc<dyn ResponseScorer>,
    catalog: Arc<dyn TemplateCatalog>,
}

impl SessionOrchestrator {
    pub fn new(
        store: Arc<SessionStore>,
        registry: Arc<ActiveSessionRegistry>,
        generator: Arc<dyn DialogueGenerator>,
        scorer: Arc<dyn ResponseScorer>,
        catalog: Arc<dyn TemplateCatalog>,
    ) -> Self {
        Self {
            store,
            registry,
            generator,
            scorer,
            catalog,
        }
    }

    /// Handles `startSession`: resolves templates, creates the durable
    /// session and the live registry entry, then emits the confirmation and
    /// the simulated client's opening line.
    ///
    /// A start on a connection that already has a live session supersedes
    /// it: the prior durable record is finalized with its running mean
    /// before the new entry is created.
    pub async fn start_session(
        &self,
        connection_id: Uuid,
        outbound: &mpsc::Sender<ServerMessage>,
        payload: StartSessionPayload,
    ) -> Result<()> {
        if let Some(prev) = self.registry.remove(connection_id).await {
            warn!(
                %connection_id,
                session_id = %prev.session_id,
                "superseding live session with a new start"
            );
            self.store
                .finalize(prev.session_id, prev.current_score)
                .await;
        }

        let templates = match self.catalog.templates().await {
            Ok(set) => set,
            Err(e) => {
                warn!(error = ?e, "template catalog unavailable, using built-in defaults");
                TemplateSet {
                    personas: default_personas(),
                    scenarios: default_scenarios(),
                }
            }
        };
        let persona = resolve_persona(&payload, &templates);
        let scenario = resolve_scenario(&payload, &templates);
        let agent_name = payload
            .agent_name
            .unwrap_or_else(|| "Anonymous Agent".to_string());

        let session = self
            .store
            .create(&agent_name, persona.clone(), scenario.clone())
            .await;
        info!(
            session_id = %session.id,
            persona = %persona.id,
            scenario = %scenario.id,
            %agent_name,
            "session started"
        );

        let state =
            ActiveSessionState::new(session.id, agent_name, persona.clone(), scenario.clone());
        if self.registry.create(connection_id, state).await.is_err() {
            // The entry was removed above and this connection's events are
            // serialized, so this cannot fire.
            warn!(%connection_id, "registry entry reappeared during start");
        }

        outbound
            .send(ServerMessage::SessionStarted {
                session_id: session.id,
                persona: persona.clone(),
                scenario: scenario.clone(),
            })
            .await?;

        let greeting = match timeout(
            COLLABORATOR_TIMEOUT,
            self.generator
                .client_utterance(&persona, &scenario, TurnKind::Greeting, None, &[]),
        )
        .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(error = ?e, persona = %persona.id, "dialogue generation failed, using canned greeting");
                fallback_utterance(&persona.id, TurnKind::Greeting)
            }
            Err(_) => {
                warn!(persona = %persona.id, "dialogue generation timed out, using canned greeting");
                fallback_utterance(&persona.id, TurnKind::Greeting)
            }
        };
        outbound
            .send(ServerMessage::ClientSpeaking {
                message: greeting,
                persona_id: persona.id,
                timestamp: Utc::now(),
            })
            .await?;
        Ok(())
    }

    /// Handles one `agentResponse` turn: score the utterance, generate the
    /// client's reply, fold the score into the running mean, persist the
    /// exchange, and emit the score update followed by the reply.
    ///
    /// A turn arriving for a connection with no live session is dropped
    /// without mutation or emission; that happens legitimately when an
    /// event races a disconnect.
    pub async fn agent_response(
        &self,
        connection_id: Uuid,
        outbound: &mpsc::Sender<ServerMessage>,
        transcript: &str,
    ) -> Result<()> {
        let Some((session_id, persona, scenario, history)) = self
            .registry
            .with_entry(connection_id, |s| {
                (
                    s.session_id,
                    s.persona.clone(),
                    s.scenario.clone(),
                    s.transcript(),
                )
            })
            .await
        else {
            return Ok(());
        };

        // Scoring and generation are independent reads of the same
        // immutable snapshot, so they run concurrently.
        let score_task = async {
            if transcript.trim().is_empty() {
                return 0;
            }
            match timeout(
                COLLABORATOR_TIMEOUT,
                self.scorer.score(transcript, &persona, &history),
            )
            .await
            {
                Ok(Ok(score)) => score.min(MAX_SCORE),
                Ok(Err(e)) => {
                    warn!(error = ?e, "scoring service failed, using lexical fallback");
                    lexical_score(transcript)
                }
                Err(_) => {
                    warn!("scoring service timed out, using lexical fallback");
                    lexical_score(transcript)
                }
            }
        };
        let reply_task = async {
            match timeout(
                COLLABORATOR_TIMEOUT,
                self.generator.client_utterance(
                    &persona,
                    &scenario,
                    TurnKind::Response,
                    Some(transcript),
                    &history,
                ),
            )
            .await
            {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    warn!(error = ?e, persona = %persona.id, "dialogue generation failed, using canned reply");
                    fallback_utterance(&persona.id, TurnKind::Response)
                }
                Err(_) => {
                    warn!(persona = %persona.id, "dialogue generation timed out, using canned reply");
                    fallback_utterance(&persona.id, TurnKind::Response)
                }
            }
        };
        let (score, client_reply) = tokio::join!(score_task, reply_task);

        let feedback = feedback_for(score);
        let timestamp = Utc::now();

        let committed = self
            .registry
            .with_entry(connection_id, |s| {
                let (overall, total) = s.record_turn(score);
                s.interactions.push(Interaction::Agent {
                    text: transcript.to_string(),
                    score,
                    timestamp,
                });
                s.interactions.push(Interaction::Client {
                    text: client_reply.clone(),
                    timestamp,
                });
                (overall, total)
            })
            .await;
        let Some((overall_score, total_interactions)) = committed else {
            info!(%connection_id, "session closed mid-turn, discarding results");
            return Ok(());
        };

        let exchange = Exchange {
            agent_message: transcript.to_string(),
            agent_score: score,
            feedback: feedback.clone(),
            client_message: Some(client_reply.clone()),
            timestamp,
        };
        if !self.store.append_exchange(session_id, exchange).await {
            warn!(%session_id, "exchange could not be persisted, continuing in memory");
        }

        outbound
            .send(ServerMessage::ScoreUpdate {
                interaction_score: score,
                overall_score,
                feedback,
                total_interactions,
            })
            .await?;
        outbound
            .send(ServerMessage::ClientSpeaking {
                message: client_reply,
                persona_id: persona.id,
                timestamp,
            })
            .await?;
        Ok(())
    }

    /// Handles `endSession`: finalizes the durable record and emits the
    /// session report. Silent no-op without a live session.
    pub async fn end_session(
        &self,
        connection_id: Uuid,
        outbound: &mpsc::Sender<ServerMessage>,
    ) -> Result<()> {
        let Some(state) = self.registry.remove(connection_id).await else {
            return Ok(());
        };
        if self
            .store
            .finalize(state.session_id, state.current_score)
            .await
            .is_none()
        {
            warn!(session_id = %state.session_id, "finalize found no durable session");
        }

        let report = SessionReport {
            agent_name: state.agent_name,
            persona_id: state.persona.id,
            duration_ms: (Utc::now() - state.start_time).num_milliseconds(),
            final_score: state.current_score,
            total_interactions: state.total_interactions,
            interactions: state.interactions,
            session_id: state.session_id,
        };
        info!(
            session_id = %report.session_id,
            final_score = report.final_score,
            interactions = report.total_interactions,
            "session ended"
        );
        outbound
            .send(ServerMessage::SessionReport { report })
            .await?;
        Ok(())
    }

    /// Transport-level disconnect: same finalization as an explicit end but
    /// with nobody left to report to. Safe after a prior `end_session`.
    pub async fn disconnect(&self, connection_id: Uuid) {
        let Some(state) = self.registry.remove(connection_id).await else {
            return;
        };
        self.store
            .finalize(state.session_id, state.current_score)
            .await;
        info!(session_id = %state.session_id, "session finalized on disconnect");
    }
}

fn resolve_persona(payload: &StartSessionPayload, set: &TemplateSet) -> Persona {
    if let Some(persona) = &payload.persona {
        return persona.clone();
    }
    if let Some(id) = &payload.persona_id {
        if let Some(persona) = set.personas.iter().find(|p| &p.id == id) {
            return persona.clone();
        }
        warn!(%id, "unknown persona id, using the first available template");
    }
    set.personas
        .first()
        .cloned()
        .unwrap_or_else(|| default_personas().swap_remove(0))
}

fn resolve_scenario(payload: &StartSessionPayload, set: &TemplateSet) -> Scenario {
    if let Some(scenario) = &payload.scenario {
        return scenario.clone();
    }
    if let Some(id) = &payload.scenario_id {
        if let Some(scenario) = set.scenarios.iter().find(|s| &s.id == id) {
            return scenario.clone();
        }
        warn!(%id, "unknown scenario id, using the first available template");
    }
    set.scenarios
        .first()
        .cloned()
        .unwrap_or_else(|| default_scenarios().swap_remove(0))
}
