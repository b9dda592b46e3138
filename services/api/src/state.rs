//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources: the session store, the active-session registry, the
//! orchestrator, and the template catalog.

use crate::config::Config;
use crate::orchestrator::SessionOrchestrator;
use crate::registry::ActiveSessionRegistry;
use crate::store::SessionStore;
use sparring_core::catalog::TemplateCatalog;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub registry: Arc<ActiveSessionRegistry>,
    pub orchestrator: Arc<SessionOrchestrator>,
    pub catalog: Arc<dyn TemplateCatalog>,
    pub config: Arc<Config>,
}
