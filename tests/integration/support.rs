//! Shared test harness: scripted completion provider and a wired app state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use codeask_desktop::models::analysis::{AnalysisDefinition, StageConfig};
use codeask_desktop::models::model_binding::ModelBinding;
use codeask_desktop::models::plugin::PluginDefinition;
use codeask_desktop::services::analysis::{AnalysisProgress, ProviderFactory};
use codeask_desktop::services::file_system::LocalFileSystem;
use codeask_desktop::services::notifier::CollectingNotifier;
use codeask_desktop::storage::{ConfigService, MemoryKeyValueStore};
use codeask_desktop::{AppResult, AppState, Services};
use codeask_llm::{LlmError, LlmProvider, LlmRequestOptions, LlmResponse, LlmResult, Message, ProviderConfig};
use tempfile::TempDir;

pub const STAGE1_PROMPT: &str = "Describe what this file does.";
pub const STAGE2_PROMPT: &str = "Summarize the per-file findings.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(String),
    End(String),
}

#[derive(Debug, Clone)]
pub struct Call {
    pub system: String,
    pub user: String,
}

/// Completion provider answering from a script keyed by relative path
pub struct ScriptedProvider {
    config: ProviderConfig,
    delays: HashMap<String, Duration>,
    failures: HashMap<String, String>,
    responses: HashMap<String, String>,
    summary: Result<String, String>,
    summary_delay: Option<Duration>,
    calls: Mutex<Vec<Call>>,
    events: Mutex<Vec<Event>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            config: ProviderConfig::default(),
            delays: HashMap::new(),
            failures: HashMap::new(),
            responses: HashMap::new(),
            summary: Ok("Overall summary".to_string()),
            summary_delay: None,
            calls: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn delay(mut self, rel: &str, delay: Duration) -> Self {
        self.delays.insert(rel.to_string(), delay);
        self
    }

    pub fn fail(mut self, rel: &str, message: &str) -> Self {
        self.failures.insert(rel.to_string(), message.to_string());
        self
    }

    pub fn respond(mut self, rel: &str, text: &str) -> Self {
        self.responses.insert(rel.to_string(), text.to_string());
        self
    }

    pub fn summary(mut self, text: &str) -> Self {
        self.summary = Ok(text.to_string());
        self
    }

    pub fn fail_summary(mut self, message: &str) -> Self {
        self.summary = Err(message.to_string());
        self
    }

    pub fn summary_delay(mut self, delay: Duration) -> Self {
        self.summary_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Per-file calls only, in start order
    pub fn file_calls(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| file_of(&c.user))
            .collect()
    }

    pub fn summary_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| file_of(&c.user).is_none())
            .collect()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

fn file_of(user: &str) -> Option<String> {
    let rest = user.strip_prefix("File: ")?;
    rest.split("\n\n").next().map(str::to_string)
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        _request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        let user = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.calls.lock().unwrap().push(Call {
            system: system.unwrap_or_default(),
            user: user.clone(),
        });

        let Some(rel) = file_of(&user) else {
            if let Some(delay) = self.summary_delay {
                tokio::time::sleep(delay).await;
            }
            return match &self.summary {
                Ok(text) => Ok(LlmResponse::text("scripted", text.clone())),
                Err(message) => Err(LlmError::other(message.clone())),
            };
        };

        self.events.lock().unwrap().push(Event::Start(rel.clone()));
        if let Some(delay) = self.delays.get(&rel) {
            tokio::time::sleep(*delay).await;
        }
        self.events.lock().unwrap().push(Event::End(rel.clone()));

        if let Some(message) = self.failures.get(&rel) {
            return Err(LlmError::other(message.clone()));
        }
        let text = self
            .responses
            .get(&rel)
            .cloned()
            .unwrap_or_else(|| format!("Notes on {}", rel));
        Ok(LlmResponse::text("scripted", text))
    }
}

/// Hands out the same scripted provider for every binding
pub struct ScriptedFactory {
    provider: Arc<ScriptedProvider>,
}

impl ProviderFactory for ScriptedFactory {
    fn create(&self, _binding: &ModelBinding, _timeout: Option<Duration>) -> AppResult<Arc<dyn LlmProvider>> {
        Ok(self.provider.clone())
    }
}

/// Project directory plus an app state wired to a scripted provider
pub struct Harness {
    pub project: TempDir,
    pub home: TempDir,
    pub store: Arc<MemoryKeyValueStore>,
    pub provider: Arc<ScriptedProvider>,
    pub notifier: Arc<CollectingNotifier>,
    pub state: AppState,
}

impl Harness {
    pub fn new(provider: ScriptedProvider) -> Self {
        let project = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryKeyValueStore::new());
        let provider = Arc::new(provider);
        let notifier = Arc::new(CollectingNotifier::new());
        let state = build_state(home.path(), store.clone(), provider.clone(), notifier.clone());
        Self {
            project,
            home,
            store,
            provider,
            notifier,
            state,
        }
    }

    pub fn root(&self) -> PathBuf {
        std::fs::canonicalize(self.project.path()).unwrap()
    }

    pub fn write(&self, rel: &str, content: &str) {
        self.write_bytes(rel, content.as_bytes());
    }

    pub fn write_bytes(&self, rel: &str, content: &[u8]) {
        let path = self.project.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn sidecar(&self) -> serde_json::Value {
        let raw = std::fs::read_to_string(self.project.path().join(".codeaskdata")).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    pub fn add_model(&self, concurrency: usize) -> String {
        let mut binding = ModelBinding::new("scripted-model", "http://localhost:1/v1");
        binding.concurrency_limit = concurrency;
        self.state.models().add(binding).unwrap().id
    }

    pub fn add_analysis(&self, model_id: &str) -> String {
        let def = AnalysisDefinition::new(
            "Overview",
            StageConfig::new(model_id, STAGE1_PROMPT),
            StageConfig::new(model_id, STAGE2_PROMPT),
        );
        self.state.analyses().add_local(def).unwrap().id
    }

    pub fn add_plugin(&self, model_id: &str) -> String {
        let def = PluginDefinition::new("Explain", model_id, "Explain this file.");
        self.state.plugins().add_local(def).unwrap().id
    }

    /// Open the project with `extensions` and select everything
    pub async fn open_all(&self, extensions: &[&str]) {
        let extensions = extensions.iter().map(|e| e.to_string()).collect();
        self.state
            .open_project(&self.root(), Some(extensions))
            .await
            .unwrap();
        self.state.select_all(true).await.unwrap();
    }

    pub async fn run(&self, analysis_id: &str) -> (AppResult<codeask_desktop::services::RunOutcome>, Vec<AnalysisProgress>) {
        let mut progress = Vec::new();
        let outcome = self
            .state
            .run_analysis(analysis_id, None, |p| progress.push(p))
            .await;
        (outcome, progress)
    }
}

pub fn build_state(
    home: &Path,
    store: Arc<MemoryKeyValueStore>,
    provider: Arc<ScriptedProvider>,
    notifier: Arc<CollectingNotifier>,
) -> AppState {
    AppState::with_services(Services {
        config: ConfigService::open(home.join("config.json")).unwrap(),
        store,
        fs: Arc::new(LocalFileSystem::new()),
        providers: Arc::new(ScriptedFactory { provider }),
        notifier,
    })
    .unwrap()
}
