//! Active Session Registry
//!
//! The one structure shared across connections: a map from connection
//! identity to the live, mutable state of that connection's in-progress
//! session. Entries are only ever read or mutated by the connection that
//! created them; the mutex exists because create/remove can race a
//! disconnect, not to coordinate writers on one entry.
//!
//! Pure bookkeeping: no I/O happens here.

use crate::models::Interaction;
use chrono::{DateTime, Utc};
use sparring_core::dialogue::{Speaker, Utterance};
use sparring_core::persona::{Persona, Scenario};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// The ephemeral state of one in-progress session.
///
/// Holds denormalized persona/scenario snapshots so turns never re-fetch
/// templates, plus the running counters that feed the live score display.
#[derive(Debug, Clone)]
pub struct ActiveSessionState {
    pub session_id: Uuid,
    pub agent_name: String,
    pub persona: Persona,
    pub scenario: Scenario,
    pub start_time: DateTime<Utc>,
    pub interactions: Vec<Interaction>,
    pub current_score: f64,
    pub total_interactions: u32,
}

impl ActiveSessionState {
    pub fn new(
        session_id: Uuid,
        agent_name: String,
        persona: Persona,
        scenario: Scenario,
    ) -> Self {
        Self {
            session_id,
            agent_name,
            persona,
            scenario,
            start_time: Utc::now(),
            interactions: Vec::new(),
            current_score: 0.0,
            total_interactions: 0,
        }
    }

    /// Folds one turn score into the running mean.
    ///
    /// Post-increments the interaction count `n` and applies
    /// `new_mean = (old_mean * (n - 1) + score) / n`, which is exactly the
    /// arithmetic mean of every score seen so far. Each turn's score enters
    /// here exactly once, fallback-scored turns included.
    pub fn record_turn(&mut self, score: u8) -> (f64, u32) {
        self.total_interactions += 1;
        let n = f64::from(self.total_interactions);
        self.current_score = (self.current_score * (n - 1.0) + f64::from(score)) / n;
        (self.current_score, self.total_interactions)
    }

    /// The transcript so far, in the transport-free shape the external
    /// collaborators consume.
    pub fn transcript(&self) -> Vec<Utterance> {
        self.interactions
            .iter()
            .map(|i| match i {
                Interaction::Agent { text, .. } => Utterance {
                    speaker: Speaker::Agent,
                    text: text.clone(),
                },
                Interaction::Client { text, .. } => Utterance {
                    speaker: Speaker::Client,
                    text: text.clone(),
                },
            })
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("connection already has an active session")]
pub struct AlreadyActive;

/// Concurrency-safe map of live sessions, keyed by connection id.
#[derive(Default)]
pub struct ActiveSessionRegistry {
    inner: Mutex<HashMap<Uuid, ActiveSessionState>>,
}

impl ActiveSessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a live session for a connection. At most one entry may
    /// exist per connection; a second create is rejected.
    pub async fn create(
        &self,
        connection_id: Uuid,
        state: ActiveSessionState,
    ) -> Result<(), AlreadyActive> {
        let mut inner = self.inner.lock().await;
        if inner.contains_key(&connection_id) {
            return Err(AlreadyActive);
        }
        inner.insert(connection_id, state);
        Ok(())
    }

    /// Runs `f` against the connection's entry under the map lock. Returns
    /// `None` when no entry exists (e.g. after a disconnect race). `f` must
    /// not block; the lock is held only for the duration of the closure.
    pub async fn with_entry<F, R>(&self, connection_id: Uuid, f: F) -> Option<R>
    where
        F: FnOnce(&mut ActiveSessionState) -> R,
    {
        let mut inner = self.inner.lock().await;
        inner.get_mut(&connection_id).map(f)
    }

    /// Removes and returns the connection's entry, if any.
    pub async fn remove(&self, connection_id: Uuid) -> Option<ActiveSessionState> {
        self.inner.lock().await.remove(&connection_id)
    }

    pub async fn contains(&self, connection_id: Uuid) -> bool {
        self.inner.lock().await.contains_key(&connection_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
