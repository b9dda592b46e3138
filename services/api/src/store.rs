//! Durable Session Store
//!
//! Every session ever created lives in one JSON document on disk. The store
//! keeps the working copy in memory and rewrites the whole file synchronously
//! on every mutation, so callers pay the write latency on the mutating path
//! and a crash loses at most the mutation in flight. Writes go through a
//! temp file + rename so the document on disk is never half-written.
//!
//! A failed write is logged and the in-memory state is kept; the durable
//! record may lag by one mutation until the next successful write.

use crate::models::{Exchange, GroupStats, Session, SessionStats, SessionStatus};
use chrono::Utc;
use sparring_core::persona::{Persona, Scenario};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct SessionStore {
    path: PathBuf,
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Loads the persisted document, if any. A missing file means a fresh
    /// store; a corrupt file is reported and treated the same way rather
    /// than blocking startup.
    pub async fn load(&self) -> usize {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no existing sessions file, starting fresh");
                return 0;
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to read sessions file");
                return 0;
            }
        };

        match serde_json::from_str::<Vec<Session>>(&raw) {
            Ok(list) => {
                let mut sessions = self.sessions.lock().await;
                *sessions = list.into_iter().map(|s| (s.id, s)).collect();
                sessions.len()
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "sessions file is corrupt, starting fresh");
                0
            }
        }
    }

    /// Creates a new active session with value snapshots of the chosen
    /// persona and scenario.
    pub async fn create(
        &self,
        agent_name: &str,
        persona: Persona,
        scenario: Scenario,
    ) -> Session {
        let session = Session {
            id: Uuid::new_v4(),
            agent_name: agent_name.to_string(),
            persona,
            scenario,
            start_time: Utc::now(),
            end_time: None,
            duration_ms: None,
            exchanges: Vec::new(),
            final_score: None,
            status: SessionStatus::Active,
            has_recording: false,
            recording_url: None,
        };

        let mut sessions = self.sessions.lock().await;
        sessions.insert(session.id, session.clone());
        self.persist(&sessions).await;
        session
    }

    /// Appends one completed exchange. Returns `false` for an unknown id or
    /// a session that has already been finalized; appending is never an
    /// error that aborts the caller.
    pub async fn append_exchange(&self, session_id: Uuid, exchange: Exchange) -> bool {
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get_mut(&session_id) else {
            return false;
        };
        if session.status == SessionStatus::Completed {
            warn!(%session_id, "dropping exchange for a completed session");
            return false;
        }
        session.exchanges.push(exchange);
        self.persist(&sessions).await;
        true
    }

    /// Marks a session completed, stamping end time, duration, and the final
    /// score. Finalizing an already-completed session is a no-op that
    /// returns the record unchanged, so an explicit end racing a disconnect
    /// is safe.
    pub async fn finalize(&self, session_id: Uuid, final_score: f64) -> Option<Session> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(&session_id)?;
        if session.status == SessionStatus::Completed {
            return Some(session.clone());
        }

        let end_time = Utc::now();
        session.end_time = Some(end_time);
        session.duration_ms = Some((end_time - session.start_time).num_milliseconds());
        session.final_score = Some(final_score);
        session.status = SessionStatus::Completed;
        let finalized = session.clone();
        self.persist(&sessions).await;
        Some(finalized)
    }

    pub async fn get(&self, session_id: Uuid) -> Option<Session> {
        self.sessions.lock().await.get(&session_id).cloned()
    }

    /// All sessions, newest start time first, truncated to `limit`.
    pub async fn history(&self, limit: usize) -> Vec<Session> {
        let sessions = self.sessions.lock().await;
        let mut list: Vec<Session> = sessions.values().cloned().collect();
        list.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        list.truncate(limit);
        list
    }

    /// Sessions belonging to one agent identity, newest first.
    pub async fn sessions_for_agent(&self, agent_name: &str) -> Vec<Session> {
        let sessions = self.sessions.lock().await;
        let mut list: Vec<Session> = sessions
            .values()
            .filter(|s| s.agent_name == agent_name)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        list
    }

    pub async fn stats_global(&self) -> SessionStats {
        let sessions = self.sessions.lock().await;
        compute_stats(sessions.values())
    }

    pub async fn stats_for_agent(&self, agent_name: &str) -> SessionStats {
        let sessions = self.sessions.lock().await;
        compute_stats(sessions.values().filter(|s| s.agent_name == agent_name))
    }

    /// The recording collaborator's narrow update: flips the flag and
    /// locator without touching exchanges, scores, or status.
    pub async fn set_recording(
        &self,
        session_id: Uuid,
        has_recording: bool,
        recording_url: Option<String>,
    ) -> bool {
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get_mut(&session_id) else {
            return false;
        };
        session.has_recording = has_recording;
        session.recording_url = recording_url;
        self.persist(&sessions).await;
        true
    }

    /// Rewrites the full document. Called with the map lock held so writes
    /// land in mutation order.
    async fn persist(&self, sessions: &HashMap<Uuid, Session>) {
        let mut list: Vec<&Session> = sessions.values().collect();
        list.sort_by(|a, b| a.start_time.cmp(&b.start_time));

        let json = match serde_json::to_string_pretty(&list) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "failed to serialize session store");
                return;
            }
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    error!(path = %parent.display(), error = %e, "failed to create store directory");
                    return;
                }
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        if let Err(e) = tokio::fs::write(&tmp, json).await {
            error!(path = %tmp.display(), error = %e, "failed to write session store");
            return;
        }
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            error!(path = %self.path.display(), error = %e, "failed to replace session store");
        }
    }
}

fn compute_stats<'a>(sessions: impl Iterator<Item = &'a Session>) -> SessionStats {
    let completed: Vec<&Session> = sessions
        .filter(|s| s.status == SessionStatus::Completed && s.final_score.is_some())
        .collect();
    if completed.is_empty() {
        return SessionStats::default();
    }

    let count = completed.len();
    let score_sum: f64 = completed.iter().filter_map(|s| s.final_score).sum();
    let duration_sum: i64 = completed.iter().filter_map(|s| s.duration_ms).sum();

    let mut persona_groups: HashMap<String, (usize, f64)> = HashMap::new();
    let mut scenario_groups: HashMap<String, (usize, f64)> = HashMap::new();
    for session in &completed {
        let score = session.final_score.unwrap_or_default();
        let entry = persona_groups
            .entry(session.persona.name.clone())
            .or_default();
        entry.0 += 1;
        entry.1 += score;
        let entry = scenario_groups
            .entry(session.scenario.name.clone())
            .or_default();
        entry.0 += 1;
        entry.1 += score;
    }

    let into_stats = |groups: HashMap<String, (usize, f64)>| {
        groups
            .into_iter()
            .map(|(name, (count, total))| {
                (
                    name,
                    GroupStats {
                        count,
                        average_score: total / count as f64,
                    },
                )
            })
            .collect()
    };

    SessionStats {
        total_sessions: count,
        average_score: score_sum / count as f64,
        average_duration_ms: duration_sum as f64 / count as f64,
        persona_breakdown: into_stats(persona_groups),
        scenario_breakdown: into_stats(scenario_groups),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sparring_core::persona::{default_personas, default_scenarios};
    use sparring_core::scoring::feedback_for;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> SessionStore {
        SessionStore::new(dir.path().join("sessions.json"))
    }

    fn exchange(score: u8, agent_message: &str) -> Exchange {
        Exchange {
            agent_message: agent_message.to_string(),
            agent_score: score,
            feedback: feedback_for(score),
            client_message: Some("Fine.".to_string()),
            timestamp: Utc::now(),
        }
    }

    async fn create(store: &SessionStore, agent: &str, persona_idx: usize) -> Session {
        store
            .create(
                agent,
                default_personas().swap_remove(persona_idx),
                default_scenarios().swap_remove(0),
            )
            .await
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let session = create(&store, "casey", 0).await;
        let fetched = store.get(session.id).await.unwrap();
        assert_eq!(fetched.agent_name, "casey");
        assert_eq!(fetched.status, SessionStatus::Active);
        assert!(fetched.exchanges.is_empty());
        assert!(fetched.final_score.is_none());
    }

    #[tokio::test]
    async fn exchanges_are_retrievable_in_append_order() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let session = create(&store, "casey", 0).await;

        for msg in ["first", "second", "third"] {
            assert!(store.append_exchange(session.id, exchange(2, msg)).await);
        }

        let fetched = store.get(session.id).await.unwrap();
        let order: Vec<&str> = fetched
            .exchanges
            .iter()
            .map(|e| e.agent_message.as_str())
            .collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn append_to_unknown_session_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(!store.append_exchange(Uuid::new_v4(), exchange(1, "hi")).await);
    }

    #[tokio::test]
    async fn finalize_stamps_completion_fields() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let session = create(&store, "casey", 0).await;

        let finalized = store.finalize(session.id, 2.5).await.unwrap();
        assert_eq!(finalized.status, SessionStatus::Completed);
        assert_eq!(finalized.final_score, Some(2.5));
        assert!(finalized.end_time.is_some());
        assert!(finalized.duration_ms.is_some());
    }

    #[tokio::test]
    async fn finalize_twice_keeps_the_first_result() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let session = create(&store, "casey", 0).await;

        let first = store.finalize(session.id, 2.0).await.unwrap();
        let second = store.finalize(session.id, 0.0).await.unwrap();
        assert_eq!(second.final_score, Some(2.0));
        assert_eq!(second.end_time, first.end_time);
    }

    #[tokio::test]
    async fn finalize_unknown_session_returns_none() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.finalize(Uuid::new_v4(), 1.0).await.is_none());
    }

    #[tokio::test]
    async fn append_after_finalize_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let session = create(&store, "casey", 0).await;

        store.finalize(session.id, 3.0).await.unwrap();
        assert!(!store.append_exchange(session.id, exchange(3, "late")).await);
        assert!(store.get(session.id).await.unwrap().exchanges.is_empty());
    }

    #[tokio::test]
    async fn history_is_newest_first_and_limited() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let first = create(&store, "a", 0).await;
        let second = create(&store, "b", 0).await;
        let third = create(&store, "c", 0).await;

        let history = store.history(2).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, third.id);
        assert_eq!(history[1].id, second.id);
        assert!(history.iter().all(|s| s.id != first.id));
    }

    #[tokio::test]
    async fn sessions_for_agent_filters_by_identity() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        create(&store, "casey", 0).await;
        create(&store, "riley", 0).await;
        create(&store, "casey", 1).await;

        let sessions = store.sessions_for_agent("casey").await;
        assert_eq!(sessions.len(), 2);
        assert!(sessions.iter().all(|s| s.agent_name == "casey"));
    }

    #[tokio::test]
    async fn stats_average_and_group_by_template_names() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        // Two "Normal Customer" sessions and one "Unhappy Customer".
        let a = create(&store, "casey", 0).await;
        let b = create(&store, "casey", 0).await;
        let c = create(&store, "riley", 1).await;
        store.finalize(a.id, 1.0).await.unwrap();
        store.finalize(b.id, 3.0).await.unwrap();
        store.finalize(c.id, 2.0).await.unwrap();

        let stats = store.stats_global().await;
        assert_eq!(stats.total_sessions, 3);
        assert_relative_eq!(stats.average_score, 2.0);

        let normal = &stats.persona_breakdown["Normal Customer"];
        assert_eq!(normal.count, 2);
        assert_relative_eq!(normal.average_score, 2.0);
        let unhappy = &stats.persona_breakdown["Unhappy Customer"];
        assert_eq!(unhappy.count, 1);
        assert_relative_eq!(unhappy.average_score, 2.0);

        let brake = &stats.scenario_breakdown["Brake Repair"];
        assert_eq!(brake.count, 3);
    }

    #[tokio::test]
    async fn stats_skip_sessions_still_active() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let done = create(&store, "casey", 0).await;
        create(&store, "casey", 0).await; // never finalized
        store.finalize(done.id, 3.0).await.unwrap();

        let stats = store.stats_for_agent("casey").await;
        assert_eq!(stats.total_sessions, 1);
        assert_relative_eq!(stats.average_score, 3.0);
    }

    #[tokio::test]
    async fn recording_update_leaves_the_rest_untouched() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let session = create(&store, "casey", 0).await;
        store.append_exchange(session.id, exchange(2, "hi")).await;
        store.finalize(session.id, 2.0).await.unwrap();

        assert!(
            store
                .set_recording(session.id, true, Some("rec/abc.webm".into()))
                .await
        );

        let fetched = store.get(session.id).await.unwrap();
        assert!(fetched.has_recording);
        assert_eq!(fetched.recording_url.as_deref(), Some("rec/abc.webm"));
        assert_eq!(fetched.exchanges.len(), 1);
        assert_eq!(fetched.final_score, Some(2.0));
        assert_eq!(fetched.status, SessionStatus::Completed);

        assert!(!store.set_recording(Uuid::new_v4(), true, None).await);
    }

    #[tokio::test]
    async fn store_survives_a_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions.json");

        let store = SessionStore::new(&path);
        let session = create(&store, "casey", 0).await;
        store.append_exchange(session.id, exchange(3, "hello")).await;
        store.finalize(session.id, 3.0).await.unwrap();

        let reopened = SessionStore::new(&path);
        assert_eq!(reopened.load().await, 1);
        let fetched = reopened.get(session.id).await.unwrap();
        assert_eq!(fetched.exchanges.len(), 1);
        assert_eq!(fetched.final_score, Some(3.0));
        assert_eq!(fetched.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn load_with_no_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.load().await, 0);
        assert!(store.history(10).await.is_empty());
    }
}
