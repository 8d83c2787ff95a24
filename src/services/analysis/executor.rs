//! Analysis Executor
//!
//! Drives one analysis run end to end: precondition checks, stage 1,
//! stage 2, persistence and the user-facing notifications.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use codeask_core::SelectionTree;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::pipeline::{AnalysisPipeline, RunOptions};
use super::progress::{AnalysisProgress, ProgressSplit};
use crate::models::analysis::AnalysisResult;
use crate::models::settings::{AppConfig, PartialResultPolicy};
use crate::services::model_registry::ModelRegistry;
use crate::services::notifier::{Notification, Notifier};
use crate::services::registry::AnalysisRegistry;
use crate::services::result_store::ResultStore;
use crate::utils::error::{AppError, AppResult};

/// Settings applied to a single run
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    pub request_timeout: Option<Duration>,
    pub progress: ProgressSplit,
    pub partial_result_policy: PartialResultPolicy,
    pub cancellation: Option<CancellationToken>,
}

impl ExecutionOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            progress: ProgressSplit::new(config.stage1_progress_share),
            partial_result_policy: config.partial_result_policy,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            request_timeout: self.request_timeout,
            cancellation: self.cancellation.clone(),
        }
    }
}

/// What a run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    /// Results as computed, whether or not they were persisted
    pub result: AnalysisResult,
    pub stage2_error: Option<String>,
    pub persisted: bool,
    pub persist_error: Option<String>,
    pub cancelled: bool,
}

/// Runs analyses against the open project
pub struct AnalysisExecutor {
    pipeline: Arc<AnalysisPipeline>,
    analyses: Arc<AnalysisRegistry>,
    models: Arc<ModelRegistry>,
    results: Arc<ResultStore>,
    notifier: Arc<dyn Notifier>,
}

impl AnalysisExecutor {
    pub fn new(
        pipeline: Arc<AnalysisPipeline>,
        analyses: Arc<AnalysisRegistry>,
        models: Arc<ModelRegistry>,
        results: Arc<ResultStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            pipeline,
            analyses,
            models,
            results,
            notifier,
        }
    }

    /// Run `analysis_id` over the selected, visible files of `tree`.
    ///
    /// Fails before any file is touched when the analysis or one of its
    /// models is missing or disabled. Everything after that is reported
    /// through the outcome and notifications.
    pub async fn run<P>(
        &self,
        project_root: &Path,
        analysis_id: &str,
        tree: &SelectionTree,
        options: &ExecutionOptions,
        mut on_progress: P,
    ) -> AppResult<RunOutcome>
    where
        P: FnMut(AnalysisProgress),
    {
        let definition = self
            .analyses
            .get(analysis_id)
            .ok_or_else(|| AppError::AnalysisNotFound(analysis_id.to_string()))?;
        let stage1_model = self.models.resolve(&definition.stage1.model_ref)?;
        let stage2_model = self.models.resolve(&definition.stage2.model_ref)?;

        let files = tree.collect_selected();
        let total = files.len();
        let split = options.progress;
        let run_options = options.run_options();
        info!(analysis_id, name = %definition.name, files = total, "analysis run started");

        on_progress(split.stage1(0, total));
        let stage1 = self
            .pipeline
            .run_stage1(
                project_root,
                files,
                &stage1_model,
                &definition.stage1.prompt,
                &run_options,
                |completed| on_progress(split.stage1(completed, total)),
            )
            .await?;

        let mut result = AnalysisResult {
            analysis_id: analysis_id.to_string(),
            per_file_results: stage1.results,
            summary_text: String::new(),
            completed_at_ms: 0,
            summary_error: None,
            definition: Some(definition.snapshot()),
        };

        if stage1.cancelled || run_options.is_cancelled() {
            return Ok(self.cancelled(analysis_id, result));
        }

        on_progress(split.stage2_started(total));
        let summary = self
            .pipeline
            .run_stage2(
                &stage2_model,
                &definition.stage2.prompt,
                &result.per_file_results,
                &run_options,
            )
            .await;
        result.completed_at_ms = chrono::Utc::now().timestamp_millis();

        match summary {
            Ok(text) => {
                result.summary_text = text;
                on_progress(split.done(total));
                self.notifier.notify(Notification::info(
                    format!("{} complete", definition.name),
                    format!(
                        "{} files analyzed, {} failed",
                        result.per_file_results.len(),
                        result.error_count()
                    ),
                ));
                Ok(self.persist(project_root, result, None).await)
            }
            Err(AppError::Cancelled) => Ok(self.cancelled(analysis_id, result)),
            Err(err) => {
                let message = err.to_string();
                error!(analysis_id, error = %message, "summary stage failed");
                self.notifier.notify(Notification::error(
                    format!("{} summary failed", definition.name),
                    message.clone(),
                ));

                match options.partial_result_policy {
                    PartialResultPolicy::PersistStage1 => {
                        result.summary_error = Some(message.clone());
                        Ok(self.persist(project_root, result, Some(message)).await)
                    }
                    PartialResultPolicy::Discard => {
                        info!(analysis_id, "stage 1 results discarded after summary failure");
                        Ok(RunOutcome {
                            result,
                            stage2_error: Some(message),
                            persisted: false,
                            persist_error: None,
                            cancelled: false,
                        })
                    }
                }
            }
        }
    }

    async fn persist(&self, project_root: &Path, result: AnalysisResult, stage2_error: Option<String>) -> RunOutcome {
        match self
            .results
            .save(project_root, &result.analysis_id, &result)
            .await
        {
            Ok(()) => {
                info!(analysis_id = %result.analysis_id, "analysis result saved");
                RunOutcome {
                    result,
                    stage2_error,
                    persisted: true,
                    persist_error: None,
                    cancelled: false,
                }
            }
            Err(err) => {
                let message = err.to_string();
                error!(analysis_id = %result.analysis_id, error = %message, "failed to save analysis result");
                self.notifier
                    .notify(Notification::error("Saving results failed", message.clone()));
                RunOutcome {
                    result,
                    stage2_error,
                    persisted: false,
                    persist_error: Some(message),
                    cancelled: false,
                }
            }
        }
    }

    fn cancelled(&self, analysis_id: &str, result: AnalysisResult) -> RunOutcome {
        warn!(
            analysis_id,
            processed = result.per_file_results.len(),
            "analysis run cancelled"
        );
        self.notifier.notify(Notification::warning(
            "Analysis cancelled",
            format!("{} files processed before cancellation", result.per_file_results.len()),
        ));
        RunOutcome {
            result,
            stage2_error: None,
            persisted: false,
            persist_error: None,
            cancelled: true,
        }
    }
}
