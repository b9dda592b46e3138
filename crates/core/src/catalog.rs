//! Template catalog lookup.
//!
//! Personas and scenarios are managed externally as a single JSON document.
//! The catalog is read-only from this crate's point of view; callers are
//! expected to fail open to [`default_personas`]/[`default_scenarios`] when a
//! lookup errors.

use crate::persona::{Persona, Scenario, default_personas, default_scenarios};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The full set of templates available for new sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSet {
    #[serde(default)]
    pub personas: Vec<Persona>,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

/// Defines the contract for any source of persona/scenario templates.
#[async_trait]
pub trait TemplateCatalog: Send + Sync {
    /// Returns every persona and scenario currently available.
    async fn templates(&self) -> Result<TemplateSet>;
}

/// A `TemplateCatalog` backed by a JSON file on disk.
///
/// The file holds one object with `personas` and `scenarios` arrays. The file
/// is re-read on every call so out-of-band edits are picked up without a
/// restart; sessions snapshot what they need at creation, so a mid-session
/// edit never affects live state.
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TemplateCatalog for FileCatalog {
    async fn templates(&self) -> Result<TemplateSet> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read template file {}", self.path.display()))?;
        let set: TemplateSet = serde_json::from_str(&raw)
            .with_context(|| format!("template file {} is not valid JSON", self.path.display()))?;
        Ok(set)
    }
}

/// A `TemplateCatalog` that serves the built-in defaults. Useful for tests
/// and for running without any external configuration.
pub struct StaticCatalog;

#[async_trait]
impl TemplateCatalog for StaticCatalog {
    async fn templates(&self) -> Result<TemplateSet> {
        Ok(TemplateSet {
            personas: default_personas(),
            scenarios: default_scenarios(),
        })
    }
}
