//! Result Store
//!
//! Persists analysis results and plugin executions into the project's
//! sidecar document and keeps the results of the open project in memory.
//!
//! Every write re-reads the document from disk and replaces a single entry,
//! so sections written by other components (or newer versions) are kept.
//! Writes for one project root are serialized by an async mutex keyed by
//! the canonical root path; different roots never contend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::models::analysis::AnalysisResult;
use crate::models::plugin::PluginExecution;
use crate::models::sidecar::SidecarSection;
use crate::storage::sidecar_file::SidecarFile;
use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Default)]
struct LoadedProject {
    root: Option<PathBuf>,
    canonical_root: Option<PathBuf>,
    results: HashMap<String, AnalysisResult>,
}

/// Sidecar-backed result persistence
#[derive(Debug, Default)]
pub struct ResultStore {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
    loaded: RwLock<LoadedProject>,
}

async fn canonical_root(root: &Path) -> PathBuf {
    tokio::fs::canonicalize(root)
        .await
        .unwrap_or_else(|_| root.to_path_buf())
}

/// Run a sidecar operation off the async runtime
async fn with_sidecar<T, F>(root: &Path, f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(SidecarFile) -> AppResult<T> + Send + 'static,
{
    let sidecar = SidecarFile::for_project(root);
    tokio::task::spawn_blocking(move || f(sidecar))
        .await
        .map_err(|e| AppError::internal(format!("sidecar task failed: {}", e)))?
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, canonical: &Path) -> AppResult<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| AppError::internal("result store lock table poisoned"))?;
        Ok(locks
            .entry(canonical.to_path_buf())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }

    fn is_loaded_root(&self, canonical: &Path) -> bool {
        self.loaded
            .read()
            .map(|l| l.canonical_root.as_deref() == Some(canonical))
            .unwrap_or(false)
    }

    fn with_loaded<F>(&self, f: F) -> AppResult<()>
    where
        F: FnOnce(&mut LoadedProject),
    {
        let mut loaded = self
            .loaded
            .write()
            .map_err(|_| AppError::internal("result store cache poisoned"))?;
        f(&mut loaded);
        Ok(())
    }

    // ========================================================================
    // Analysis results
    // ========================================================================

    /// Load `analysisResults` of `root` into memory, creating an empty
    /// sidecar when none exists. Never destructive.
    pub async fn load(&self, root: &Path) -> AppResult<()> {
        let canonical = canonical_root(root).await;
        let lock = self.lock_for(&canonical)?;
        let _guard = lock.lock().await;

        let doc = with_sidecar(root, |sidecar| sidecar.load_or_create()).await?;
        let mut results = HashMap::new();
        if let Some(Value::Object(entries)) = doc.get(SidecarSection::AnalysisResults.key()) {
            for (id, value) in entries {
                match serde_json::from_value::<AnalysisResult>(value.clone()) {
                    Ok(result) => {
                        results.insert(id.clone(), result);
                    }
                    Err(e) => warn!(analysis_id = %id, error = %e, "skipping unreadable stored result"),
                }
            }
        }

        info!(root = %root.display(), count = results.len(), "analysis results loaded");
        self.with_loaded(|loaded| {
            loaded.root = Some(root.to_path_buf());
            loaded.canonical_root = Some(canonical);
            loaded.results = results;
        })
    }

    /// Root of the project whose results are in memory
    pub fn project_root(&self) -> Option<PathBuf> {
        self.loaded.read().ok().and_then(|l| l.root.clone())
    }

    pub fn get_result(&self, analysis_id: &str) -> Option<AnalysisResult> {
        self.loaded
            .read()
            .ok()
            .and_then(|l| l.results.get(analysis_id).cloned())
    }

    /// All loaded results, ordered by analysis id
    pub fn results(&self) -> Vec<AnalysisResult> {
        let Ok(loaded) = self.loaded.read() else {
            return Vec::new();
        };
        let mut results: Vec<_> = loaded.results.values().cloned().collect();
        results.sort_by(|a, b| a.analysis_id.cmp(&b.analysis_id));
        results
    }

    /// Replace `analysisResults[analysis_id]` on disk
    pub async fn save(&self, root: &Path, analysis_id: &str, result: &AnalysisResult) -> AppResult<()> {
        let value = serde_json::to_value(result)?;
        self.upsert_entry(root, SidecarSection::AnalysisResults, analysis_id, value)
            .await?;

        if self.is_loaded_root(&canonical_root(root).await) {
            let result = result.clone();
            self.with_loaded(|loaded| {
                loaded.results.insert(analysis_id.to_string(), result);
            })?;
        }
        Ok(())
    }

    /// Remove `analysisResults[analysis_id]` on disk
    pub async fn delete(&self, root: &Path, analysis_id: &str) -> AppResult<bool> {
        self.delete_entry(root, SidecarSection::AnalysisResults, analysis_id)
            .await
    }

    // ========================================================================
    // Plugin executions
    // ========================================================================

    pub async fn plugin_execution(&self, root: &Path, plugin_id: &str) -> AppResult<Option<PluginExecution>> {
        let entries = self.section_entries(root, SidecarSection::PluginExecutions).await?;
        match entries.get(plugin_id) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub async fn save_plugin_execution(&self, root: &Path, execution: &PluginExecution) -> AppResult<()> {
        let value = serde_json::to_value(execution)?;
        self.upsert_entry(root, SidecarSection::PluginExecutions, &execution.plugin_id, value)
            .await
    }

    pub async fn delete_plugin_execution(&self, root: &Path, plugin_id: &str) -> AppResult<bool> {
        self.delete_entry(root, SidecarSection::PluginExecutions, plugin_id)
            .await
    }

    // ========================================================================
    // Raw section access
    // ========================================================================

    /// Entries of one sidecar section as stored on disk
    pub async fn section_entries(&self, root: &Path, section: SidecarSection) -> AppResult<Map<String, Value>> {
        let lock = self.lock_for(&canonical_root(root).await)?;
        let _guard = lock.lock().await;
        with_sidecar(root, move |sidecar| sidecar.section(section)).await
    }

    async fn upsert_entry(&self, root: &Path, section: SidecarSection, key: &str, value: Value) -> AppResult<()> {
        let lock = self.lock_for(&canonical_root(root).await)?;
        let _guard = lock.lock().await;
        let entry_key = key.to_string();
        with_sidecar(root, move |sidecar| sidecar.upsert_entry(section, &entry_key, value)).await?;
        debug!(root = %root.display(), %section, key, "sidecar entry saved");
        Ok(())
    }

    /// Remove one entry of a section; returns whether it existed
    pub async fn delete_entry(&self, root: &Path, section: SidecarSection, key: &str) -> AppResult<bool> {
        let canonical = canonical_root(root).await;
        let lock = self.lock_for(&canonical)?;
        let _guard = lock.lock().await;
        let entry_key = key.to_string();
        let removed = with_sidecar(root, move |sidecar| sidecar.remove_entry(section, &entry_key)).await?;
        if section == SidecarSection::AnalysisResults && self.is_loaded_root(&canonical) {
            self.with_loaded(|loaded| {
                loaded.results.remove(key);
            })?;
        }
        debug!(root = %root.display(), %section, key, removed, "sidecar entry deleted");
        Ok(removed)
    }
}
