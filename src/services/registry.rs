//! Definition Registry
//!
//! Holds analysis and plugin definitions. Local definitions belong to the
//! user and are persisted in the key-value store; project-scoped ones are
//! discovered from the open project's sidecar and live in memory only.
//! Editing a project-scoped definition makes it local.

use std::sync::{Arc, RwLock, RwLockWriteGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::models::analysis::{AnalysisDefinition, AnalysisDefinitionPatch, AnalysisSnapshot};
use crate::models::plugin::{PluginDefinition, PluginDefinitionPatch, PluginSnapshot};
use crate::models::sidecar::SidecarSection;
use crate::services::result_store::ResultStore;
use crate::storage::kv_store::{load_json, save_json, KeyValueStore};
use crate::utils::error::{AppError, AppResult};

const LIST_KEY: &str = "list";

/// A definition kind managed by [`DefinitionRegistry`]
pub trait Definition: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Patch;

    /// Key-value namespace of the local list
    const NAMESPACE: &'static str;
    /// Sidecar section holding this kind's stored results
    const SECTION: SidecarSection;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn is_project_scoped(&self) -> bool;
    fn set_project_scoped(&mut self, project_scoped: bool);
    fn apply_patch(&mut self, patch: Self::Patch);
    fn validate(&self) -> Result<(), String>;
    fn not_found(id: &str) -> AppError;

    /// Rebuild a project-scoped definition from a stored sidecar entry
    fn from_sidecar_entry(id: &str, entry: &Value) -> Option<Self>;
}

impl Definition for AnalysisDefinition {
    type Patch = AnalysisDefinitionPatch;
    const NAMESPACE: &'static str = "analyses";
    const SECTION: SidecarSection = SidecarSection::AnalysisResults;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn is_project_scoped(&self) -> bool {
        self.is_project_scoped
    }

    fn set_project_scoped(&mut self, project_scoped: bool) {
        self.is_project_scoped = project_scoped;
    }

    fn apply_patch(&mut self, patch: Self::Patch) {
        patch.apply_to(self);
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Analysis name is required".to_string());
        }
        if self.stage1.model_ref.is_empty() || self.stage2.model_ref.is_empty() {
            return Err("Both stages need a model".to_string());
        }
        Ok(())
    }

    fn not_found(id: &str) -> AppError {
        AppError::AnalysisNotFound(id.to_string())
    }

    fn from_sidecar_entry(id: &str, entry: &Value) -> Option<Self> {
        let snapshot: AnalysisSnapshot = serde_json::from_value(entry.get("definition")?.clone()).ok()?;
        Some(AnalysisDefinition::from_snapshot(id, snapshot))
    }
}

impl Definition for PluginDefinition {
    type Patch = PluginDefinitionPatch;
    const NAMESPACE: &'static str = "plugins";
    const SECTION: SidecarSection = SidecarSection::PluginExecutions;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn is_project_scoped(&self) -> bool {
        self.is_project_scoped
    }

    fn set_project_scoped(&mut self, project_scoped: bool) {
        self.is_project_scoped = project_scoped;
    }

    fn apply_patch(&mut self, patch: Self::Patch) {
        patch.apply_to(self);
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Plugin name is required".to_string());
        }
        if self.model_ref.is_empty() {
            return Err("Plugin needs a model".to_string());
        }
        Ok(())
    }

    fn not_found(id: &str) -> AppError {
        AppError::PluginNotFound(id.to_string())
    }

    fn from_sidecar_entry(id: &str, entry: &Value) -> Option<Self> {
        let snapshot: PluginSnapshot = serde_json::from_value(entry.get("definition")?.clone()).ok()?;
        Some(PluginDefinition::from_snapshot(id, snapshot))
    }
}

/// Registry of one definition kind
pub struct DefinitionRegistry<D: Definition> {
    store: Arc<dyn KeyValueStore>,
    results: Arc<ResultStore>,
    definitions: RwLock<Vec<D>>,
}

pub type AnalysisRegistry = DefinitionRegistry<AnalysisDefinition>;
pub type PluginRegistry = DefinitionRegistry<PluginDefinition>;

impl<D: Definition> DefinitionRegistry<D> {
    pub fn new(store: Arc<dyn KeyValueStore>, results: Arc<ResultStore>) -> Self {
        Self {
            store,
            results,
            definitions: RwLock::new(Vec::new()),
        }
    }

    /// Load local definitions; project-scoped ones already present are kept
    pub fn load(&self) -> AppResult<usize> {
        let mut locals: Vec<D> = load_json(self.store.as_ref(), D::NAMESPACE, LIST_KEY)?.unwrap_or_default();
        for def in &mut locals {
            def.set_project_scoped(false);
        }
        let count = locals.len();

        let mut defs = self.write()?;
        let project: Vec<D> = defs.iter().filter(|d| d.is_project_scoped()).cloned().collect();
        *defs = locals;
        for def in project {
            if !defs.iter().any(|d| d.id() == def.id()) {
                defs.push(def);
            }
        }
        debug!(namespace = D::NAMESPACE, count, "local definitions loaded");
        Ok(count)
    }

    pub fn list(&self) -> Vec<D> {
        self.definitions.read().map(|d| d.clone()).unwrap_or_default()
    }

    pub fn get(&self, id: &str) -> Option<D> {
        self.definitions
            .read()
            .ok()
            .and_then(|d| d.iter().find(|def| def.id() == id).cloned())
    }

    /// Add a user-owned definition under a fresh id
    pub fn add_local(&self, mut def: D) -> AppResult<D> {
        def.validate().map_err(AppError::validation)?;
        def.set_id(uuid::Uuid::new_v4().to_string());
        def.set_project_scoped(false);

        let mut defs = self.write()?;
        let mut next = defs.clone();
        next.push(def.clone());
        self.persist(&next)?;
        *defs = next;

        info!(namespace = D::NAMESPACE, id = %def.id(), "definition added");
        Ok(def)
    }

    /// Add a definition discovered in a project. No-op if the id is known.
    pub fn add_project_scoped(&self, mut def: D) -> AppResult<bool> {
        let mut defs = self.write()?;
        if defs.iter().any(|d| d.id() == def.id()) {
            return Ok(false);
        }
        def.set_project_scoped(true);
        debug!(namespace = D::NAMESPACE, id = %def.id(), "project definition discovered");
        defs.push(def);
        Ok(true)
    }

    /// Merge `patch` into a definition; the result is always local
    pub fn update(&self, id: &str, patch: D::Patch) -> AppResult<D> {
        let mut defs = self.write()?;
        let mut next = defs.clone();
        let def = next
            .iter_mut()
            .find(|d| d.id() == id)
            .ok_or_else(|| D::not_found(id))?;
        def.apply_patch(patch);
        def.set_project_scoped(false);
        def.validate().map_err(AppError::validation)?;
        let updated = def.clone();

        self.persist(&next)?;
        *defs = next;
        Ok(updated)
    }

    /// Remove a definition and, best effort, its stored results in the open
    /// project.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        {
            let mut defs = self.write()?;
            if !defs.iter().any(|d| d.id() == id) {
                return Err(D::not_found(id));
            }
            let next: Vec<D> = defs.iter().filter(|d| d.id() != id).cloned().collect();
            self.persist(&next)?;
            *defs = next;
        }
        info!(namespace = D::NAMESPACE, id, "definition deleted");

        if let Some(root) = self.results.project_root() {
            if let Err(e) = self.results.delete_entry(&root, D::SECTION, id).await {
                warn!(
                    namespace = D::NAMESPACE,
                    id,
                    error = %e,
                    "failed to remove stored results of deleted definition"
                );
            }
        }
        Ok(())
    }

    /// Forget every project-scoped definition
    pub fn clear_project_scoped(&self) -> AppResult<()> {
        self.write()?.retain(|d| !d.is_project_scoped());
        Ok(())
    }

    /// Register the definitions stored in a project's sidecar; returns how
    /// many were new
    pub async fn discover(&self, project_root: &std::path::Path) -> AppResult<usize> {
        let entries = self.results.section_entries(project_root, D::SECTION).await?;
        let mut added = 0;
        for (id, entry) in &entries {
            if let Some(def) = D::from_sidecar_entry(id, entry) {
                if self.add_project_scoped(def)? {
                    added += 1;
                }
            }
        }
        info!(namespace = D::NAMESPACE, added, "project definitions discovered");
        Ok(added)
    }

    fn persist(&self, defs: &[D]) -> AppResult<()> {
        let locals: Vec<&D> = defs.iter().filter(|d| !d.is_project_scoped()).collect();
        save_json(self.store.as_ref(), D::NAMESPACE, LIST_KEY, &locals)
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, Vec<D>>> {
        self.definitions
            .write()
            .map_err(|_| AppError::internal("definition registry lock poisoned"))
    }
}
