//! Analysis Pipeline
//!
//! The two model-calling stages of an analysis run.
//!
//! Stage 1 sends every selected file to the stage-1 model, in chunks of the
//! model's concurrency limit, and records one `PerFileResult` per file. A
//! failure while reading, hashing or calling the model becomes that file's
//! error entry; siblings keep going.
//!
//! Stage 2 sends the whole stage-1 array, serialized as JSON, to the
//! summary model in a single call.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use codeask_core::BatchScheduler;
use codeask_llm::{LlmProvider, OpenAICompatibleProvider};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::analysis::PerFileResult;
use crate::models::model_binding::ModelBinding;
use crate::services::file_system::FileSystem;
use crate::services::hasher::{hash_bytes, hash_file};
use crate::services::notifier::{Notification, Notifier};
use crate::services::sanitize::sanitize_response;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::relative_path;

/// Creates completion providers for model bindings
pub trait ProviderFactory: Send + Sync {
    fn create(&self, binding: &ModelBinding, timeout: Option<Duration>) -> AppResult<Arc<dyn LlmProvider>>;
}

/// Factory for OpenAI-compatible HTTP endpoints
#[derive(Debug, Default, Clone)]
pub struct OpenAIProviderFactory;

impl ProviderFactory for OpenAIProviderFactory {
    fn create(&self, binding: &ModelBinding, timeout: Option<Duration>) -> AppResult<Arc<dyn LlmProvider>> {
        let config = binding.to_provider_config(timeout.map(|t| t.as_secs()));
        let provider = OpenAICompatibleProvider::new(config)?;
        Ok(Arc::new(provider))
    }
}

/// Per-run knobs shared by both stages
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Budget for each file read and each model call
    pub request_timeout: Option<Duration>,
    pub cancellation: Option<CancellationToken>,
}

impl RunOptions {
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map(|t| t.is_cancelled())
            .unwrap_or(false)
    }
}

/// Stage-1 results in selection order
#[derive(Debug, Clone, PartialEq)]
pub struct Stage1Outcome {
    pub results: Vec<PerFileResult>,
    /// Stopped early; files after the last started chunk have no entry
    pub cancelled: bool,
}

async fn with_timeout<T, F>(limit: Option<Duration>, what: &str, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            AppError::timeout(format!("{} exceeded {}s", what, limit.as_secs()))
        })?,
        None => fut.await,
    }
}

async fn with_cancellation<T, F>(token: Option<&CancellationToken>, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match token {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(AppError::Cancelled),
                result = fut => result,
            }
        }
        None => fut.await,
    }
}

/// Runs the per-file and summary stages against the completion service
pub struct AnalysisPipeline {
    fs: Arc<dyn FileSystem>,
    providers: Arc<dyn ProviderFactory>,
    notifier: Arc<dyn Notifier>,
}

impl AnalysisPipeline {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        providers: Arc<dyn ProviderFactory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            fs,
            providers,
            notifier,
        }
    }

    /// Run stage 1 over `files` (absolute paths, in selection order).
    ///
    /// `on_progress` receives the number of finished files after each one.
    /// Only provider construction can fail the whole stage.
    pub async fn run_stage1<P>(
        &self,
        project_root: &Path,
        files: Vec<String>,
        binding: &ModelBinding,
        prompt: &str,
        options: &RunOptions,
        on_progress: P,
    ) -> AppResult<Stage1Outcome>
    where
        P: FnMut(usize),
    {
        let provider = self.providers.create(binding, options.request_timeout)?;
        let total = files.len();
        info!(
            model = %binding.name,
            files = total,
            limit = binding.effective_concurrency(),
            "stage 1 started"
        );

        let mut scheduler = BatchScheduler::new(binding.effective_concurrency());
        if let Some(token) = &options.cancellation {
            scheduler = scheduler.with_cancellation(token.clone());
        }

        let provider = provider.as_ref();
        let outcome = scheduler
            .run(
                files,
                |file| self.process_file(provider, project_root, PathBuf::from(file), prompt, options),
                on_progress,
            )
            .await;

        let errors = outcome.results.iter().filter(|r| !r.is_success()).count();
        info!(
            processed = outcome.results.len(),
            errors,
            cancelled = outcome.cancelled,
            "stage 1 finished"
        );

        Ok(Stage1Outcome {
            results: outcome.results,
            cancelled: outcome.cancelled,
        })
    }

    async fn process_file(
        &self,
        provider: &dyn LlmProvider,
        project_root: &Path,
        path: PathBuf,
        prompt: &str,
        options: &RunOptions,
    ) -> PerFileResult {
        let rel = relative_path(project_root, &path);

        let work = async {
            let bytes = with_timeout(options.request_timeout, "file read", self.fs.read_bytes(&path)).await?;
            let content_hash = hash_bytes(&bytes);
            let content = String::from_utf8_lossy(&bytes);
            let user = format!("File: {}\n\nCode:\n{}", rel, content);
            let response = with_timeout(options.request_timeout, "model call", async {
                provider.complete(prompt, &user).await.map_err(AppError::from)
            })
            .await?;
            Ok((sanitize_response(response.text_content()), content_hash))
        };

        match with_cancellation(options.cancellation.as_ref(), work).await {
            Ok((text, content_hash)) => {
                debug!(path = %rel, "file analyzed");
                PerFileResult::success(rel, text, content_hash)
            }
            Err(err) => {
                let message = err.to_string();
                if !matches!(err, AppError::Cancelled) {
                    warn!(path = %rel, error = %message, "file analysis failed");
                    self.notifier
                        .notify(Notification::error(format!("Analysis failed: {}", rel), message.clone()));
                }
                let content_hash = self.best_effort_hash(&path).await;
                PerFileResult::error(rel, message, content_hash)
            }
        }
    }

    /// Hash of the current content, or empty when it cannot be read
    async fn best_effort_hash(&self, path: &Path) -> String {
        hash_file(path).await.unwrap_or_default()
    }

    /// Run stage 2 over the complete stage-1 array and return the summary.
    pub async fn run_stage2(
        &self,
        binding: &ModelBinding,
        prompt: &str,
        stage1: &[PerFileResult],
        options: &RunOptions,
    ) -> AppResult<String> {
        let provider = self.providers.create(binding, options.request_timeout)?;
        let user = serde_json::to_string(stage1)?;
        info!(model = %binding.name, entries = stage1.len(), "stage 2 started");

        let call = with_timeout(options.request_timeout, "summary call", async {
            provider.complete(prompt, &user).await.map_err(AppError::from)
        });
        let response = with_cancellation(options.cancellation.as_ref(), call).await?;
        Ok(sanitize_response(response.text_content()))
    }
}
