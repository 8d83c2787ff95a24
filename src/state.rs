//! Application State
//!
//! Session-wide state containing every service and the open project.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use codeask_core::{FileNode, FilterRules, SelectableFileNode, SelectionTree};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::models::settings::{AppConfig, SettingsUpdate};
use crate::services::analysis::{
    AnalysisExecutor, AnalysisPipeline, AnalysisProgress, ExecutionOptions, OpenAIProviderFactory,
    ProviderFactory, RunOutcome,
};
use crate::services::file_system::{FileSystem, LocalFileSystem};
use crate::services::model_registry::ModelRegistry;
use crate::services::notifier::{Notifier, TracingNotifier};
use crate::services::plugin_runner::{PluginRunOutcome, PluginRunner};
use crate::services::registry::{AnalysisRegistry, PluginRegistry};
use crate::services::result_store::ResultStore;
use crate::storage::{ConfigService, JsonFileStore, KeyValueStore};
use crate::utils::error::{AppError, AppResult};

/// Collaborators the state is built from
pub struct Services {
    pub config: ConfigService,
    pub store: Arc<dyn KeyValueStore>,
    pub fs: Arc<dyn FileSystem>,
    pub providers: Arc<dyn ProviderFactory>,
    pub notifier: Arc<dyn Notifier>,
}

/// The project currently open
#[derive(Debug, Clone)]
pub struct OpenProject {
    pub root: PathBuf,
    pub nodes: Vec<FileNode>,
    pub rules: FilterRules,
    pub selection: SelectionTree,
}

/// Application state, constructed once per session
pub struct AppState {
    config: RwLock<ConfigService>,
    fs: Arc<dyn FileSystem>,
    models: Arc<ModelRegistry>,
    analyses: Arc<AnalysisRegistry>,
    plugins: Arc<PluginRegistry>,
    results: Arc<ResultStore>,
    executor: AnalysisExecutor,
    plugin_runner: PluginRunner,
    project: RwLock<Option<OpenProject>>,
}

impl AppState {
    /// State backed by `~/.codeask`, local disk and OpenAI-compatible endpoints
    pub fn initialize() -> AppResult<Self> {
        Self::with_services(Services {
            config: ConfigService::new()?,
            store: Arc::new(JsonFileStore::open_default()?),
            fs: Arc::new(LocalFileSystem::new()),
            providers: Arc::new(OpenAIProviderFactory),
            notifier: Arc::new(TracingNotifier),
        })
    }

    /// Wire the services together and load the local registries
    pub fn with_services(services: Services) -> AppResult<Self> {
        let Services {
            config,
            store,
            fs,
            providers,
            notifier,
        } = services;

        let results = Arc::new(ResultStore::new());
        let models = Arc::new(ModelRegistry::new(store.clone()));
        let analyses = Arc::new(AnalysisRegistry::new(store.clone(), results.clone()));
        let plugins = Arc::new(PluginRegistry::new(store, results.clone()));
        models.load()?;
        analyses.load()?;
        plugins.load()?;

        let pipeline = Arc::new(AnalysisPipeline::new(fs.clone(), providers, notifier.clone()));
        let executor = AnalysisExecutor::new(
            pipeline.clone(),
            analyses.clone(),
            models.clone(),
            results.clone(),
            notifier.clone(),
        );
        let plugin_runner = PluginRunner::new(
            pipeline,
            plugins.clone(),
            models.clone(),
            results.clone(),
            notifier,
        );

        Ok(Self {
            config: RwLock::new(config),
            fs,
            models,
            analyses,
            plugins,
            results,
            executor,
            plugin_runner,
            project: RwLock::new(None),
        })
    }

    // ========================================================================
    // Configuration and registries
    // ========================================================================

    pub async fn get_config(&self) -> AppConfig {
        self.config.read().await.get_config().clone()
    }

    pub async fn update_config(&self, update: SettingsUpdate) -> AppResult<AppConfig> {
        self.config.write().await.update_config(update)
    }

    pub fn models(&self) -> &Arc<ModelRegistry> {
        &self.models
    }

    pub fn analyses(&self) -> &Arc<AnalysisRegistry> {
        &self.analyses
    }

    pub fn plugins(&self) -> &Arc<PluginRegistry> {
        &self.plugins
    }

    pub fn results(&self) -> &Arc<ResultStore> {
        &self.results
    }

    // ========================================================================
    // Project lifecycle
    // ========================================================================

    /// Open `root`: list its tree, load or create its sidecar and replace the
    /// project-scoped definitions with the ones it stores.
    ///
    /// `extensions` overrides the configured default filter.
    pub async fn open_project(&self, root: &Path, extensions: Option<Vec<String>>) -> AppResult<OpenProject> {
        let extensions = match extensions {
            Some(extensions) => extensions,
            None => self.get_config().await.default_extensions,
        };
        let rules = FilterRules::new(extensions);
        let nodes = self.fs.list_directory_tree(root).await?;
        let selection = SelectionTree::filtered(&nodes, &rules);

        self.results.load(root).await?;
        self.analyses.clear_project_scoped()?;
        self.plugins.clear_project_scoped()?;
        let analyses = self.analyses.discover(root).await?;
        let plugins = self.plugins.discover(root).await?;

        info!(
            root = %root.display(),
            nodes = selection.len(),
            visible_files = selection.visible_file_count(),
            analyses,
            plugins,
            "project opened"
        );

        let project = OpenProject {
            root: root.to_path_buf(),
            nodes,
            rules,
            selection,
        };
        *self.project.write().await = Some(project.clone());
        Ok(project)
    }

    pub async fn project_root(&self) -> Option<PathBuf> {
        self.project.read().await.as_ref().map(|p| p.root.clone())
    }

    /// Re-filter the open project's tree
    pub async fn set_filter(&self, extensions: Vec<String>) -> AppResult<Vec<SelectableFileNode>> {
        self.with_project_mut(|project| {
            project.rules = FilterRules::new(extensions);
            project.selection.apply_filter(&project.rules);
            Ok(project.selection.snapshot())
        })
        .await
    }

    pub async fn toggle_selection(&self, node_id: &str, selected: bool) -> AppResult<Vec<SelectableFileNode>> {
        self.with_project_mut(|project| {
            project.selection.toggle(node_id, selected)?;
            Ok(project.selection.snapshot())
        })
        .await
    }

    pub async fn select_all(&self, selected: bool) -> AppResult<()> {
        self.with_project_mut(|project| {
            project.selection.set_all(selected);
            Ok(())
        })
        .await
    }

    /// Files a run would process, in processing order
    pub async fn selected_files(&self) -> AppResult<Vec<String>> {
        let project = self.current_project().await?;
        Ok(project.selection.collect_selected())
    }

    // ========================================================================
    // Runs
    // ========================================================================

    pub async fn run_analysis<P>(
        &self,
        analysis_id: &str,
        cancellation: Option<CancellationToken>,
        on_progress: P,
    ) -> AppResult<RunOutcome>
    where
        P: FnMut(AnalysisProgress),
    {
        let project = self.current_project().await?;
        let options = self.execution_options(cancellation).await;
        self.executor
            .run(&project.root, analysis_id, &project.selection, &options, on_progress)
            .await
    }

    pub async fn run_plugin<P>(
        &self,
        plugin_id: &str,
        incremental: bool,
        cancellation: Option<CancellationToken>,
        on_progress: P,
    ) -> AppResult<PluginRunOutcome>
    where
        P: FnMut(AnalysisProgress),
    {
        let project = self.current_project().await?;
        let options = self.execution_options(cancellation).await;
        self.plugin_runner
            .run(
                &project.root,
                plugin_id,
                &project.selection,
                &options,
                incremental,
                on_progress,
            )
            .await
    }

    async fn execution_options(&self, cancellation: Option<CancellationToken>) -> ExecutionOptions {
        let options = ExecutionOptions::from_config(&self.get_config().await);
        match cancellation {
            Some(token) => options.with_cancellation(token),
            None => options,
        }
    }

    async fn current_project(&self) -> AppResult<OpenProject> {
        self.project
            .read()
            .await
            .clone()
            .ok_or_else(|| AppError::validation("No project is open"))
    }

    async fn with_project_mut<F, T>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut OpenProject) -> AppResult<T>,
    {
        let mut guard = self.project.write().await;
        match &mut *guard {
            Some(project) => f(project),
            None => Err(AppError::validation("No project is open")),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("models", &self.models.list().len())
            .field("analyses", &self.analyses.list().len())
            .field("plugins", &self.plugins.list().len())
            .finish()
    }
}
