//! Plugin Runner
//!
//! Single-stage, per-file runs of a plugin definition. Results merge into
//! the stored execution file by file. In incremental mode files whose stored
//! result succeeded for the same content hash are skipped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use codeask_core::SelectionTree;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::models::plugin::PluginExecution;
use crate::services::analysis::{AnalysisPipeline, AnalysisProgress, ExecutionOptions};
use crate::services::hasher::hash_file;
use crate::services::model_registry::ModelRegistry;
use crate::services::notifier::{Notification, Notifier};
use crate::services::registry::PluginRegistry;
use crate::services::result_store::ResultStore;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::relative_path;

/// What a plugin run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginRunOutcome {
    /// Merged execution, as stored when `persisted`
    pub execution: PluginExecution,
    /// Files sent to the model
    pub processed: usize,
    /// Files skipped as up to date
    pub skipped: usize,
    pub persisted: bool,
    pub cancelled: bool,
}

pub struct PluginRunner {
    pipeline: Arc<AnalysisPipeline>,
    plugins: Arc<PluginRegistry>,
    models: Arc<ModelRegistry>,
    results: Arc<ResultStore>,
    notifier: Arc<dyn Notifier>,
}

impl PluginRunner {
    pub fn new(
        pipeline: Arc<AnalysisPipeline>,
        plugins: Arc<PluginRegistry>,
        models: Arc<ModelRegistry>,
        results: Arc<ResultStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            pipeline,
            plugins,
            models,
            results,
            notifier,
        }
    }

    /// Run `plugin_id` over the selected files of `tree`.
    pub async fn run<P>(
        &self,
        project_root: &Path,
        plugin_id: &str,
        tree: &SelectionTree,
        options: &ExecutionOptions,
        incremental: bool,
        mut on_progress: P,
    ) -> AppResult<PluginRunOutcome>
    where
        P: FnMut(AnalysisProgress),
    {
        let definition = self
            .plugins
            .get(plugin_id)
            .ok_or_else(|| AppError::PluginNotFound(plugin_id.to_string()))?;
        let model = self.models.resolve(&definition.model_ref)?;

        let mut execution = self
            .results
            .plugin_execution(project_root, plugin_id)
            .await?
            .unwrap_or_else(|| PluginExecution::new(plugin_id));

        let selected = tree.collect_selected();
        let files = if incremental {
            self.stale_files(project_root, selected.clone(), &execution).await
        } else {
            selected.clone()
        };
        let skipped = selected.len() - files.len();
        let total = files.len();
        info!(plugin_id, files = total, skipped, incremental, "plugin run started");

        let split = options.progress;
        let run_options = options.run_options();
        let stage = self
            .pipeline
            .run_stage1(
                project_root,
                files,
                &model,
                &definition.prompt,
                &run_options,
                |completed| on_progress(split.stage1(completed, total)),
            )
            .await?;
        let processed = stage.results.len();

        if stage.cancelled || run_options.is_cancelled() {
            warn!(plugin_id, processed, "plugin run cancelled");
            self.notifier.notify(Notification::warning(
                format!("{} cancelled", definition.name),
                format!("{} files processed before cancellation", processed),
            ));
            execution.merge(stage.results);
            return Ok(PluginRunOutcome {
                execution,
                processed,
                skipped,
                persisted: false,
                cancelled: true,
            });
        }

        let errors = stage.results.iter().filter(|r| !r.is_success()).count();
        execution.merge(stage.results);
        execution.definition = Some(definition.snapshot());
        execution.updated_at_ms = chrono::Utc::now().timestamp_millis();
        on_progress(split.done(total));

        let persisted = match self.results.save_plugin_execution(project_root, &execution).await {
            Ok(()) => true,
            Err(err) => {
                self.notifier
                    .notify(Notification::error("Saving plugin results failed", err.to_string()));
                false
            }
        };

        self.notifier.notify(Notification::info(
            format!("{} complete", definition.name),
            format!("{} files processed, {} failed, {} up to date", processed, errors, skipped),
        ));

        Ok(PluginRunOutcome {
            execution,
            processed,
            skipped,
            persisted,
            cancelled: false,
        })
    }

    /// Files whose stored result is missing, failed or for other content
    async fn stale_files(&self, project_root: &Path, files: Vec<String>, execution: &PluginExecution) -> Vec<String> {
        let mut stale = Vec::with_capacity(files.len());
        for file in files {
            let path = PathBuf::from(&file);
            let rel = relative_path(project_root, &path);
            // unreadable: let the run record the error
            let current = hash_file(&path).await.unwrap_or_default();
            if execution.is_up_to_date(&rel, &current) {
                debug!(path = %rel, "unchanged since last successful run");
            } else {
                stale.push(file);
            }
        }
        stale
    }
}
