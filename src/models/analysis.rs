//! Analysis Models
//!
//! Two-stage analysis definitions and the results a run produces.

use serde::{Deserialize, Serialize};

/// Model and prompt for one stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageConfig {
    /// Id of the model binding used for this stage
    pub model_ref: String,
    /// System prompt, sent verbatim
    pub prompt: String,
}

impl StageConfig {
    pub fn new(model_ref: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model_ref: model_ref.into(),
            prompt: prompt.into(),
        }
    }
}

/// A named analysis: per-file stage followed by a summary stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisDefinition {
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Discovered from a project's sidecar rather than owned locally
    #[serde(default)]
    pub is_project_scoped: bool,
    /// Per-file stage
    pub stage1: StageConfig,
    /// Summary stage over all per-file results
    pub stage2: StageConfig,
}

impl AnalysisDefinition {
    pub fn new(name: impl Into<String>, stage1: StageConfig, stage2: StageConfig) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            is_project_scoped: false,
            stage1,
            stage2,
        }
    }

    /// Portable copy stored alongside results in the sidecar
    pub fn snapshot(&self) -> AnalysisSnapshot {
        AnalysisSnapshot {
            name: self.name.clone(),
            stage1: self.stage1.clone(),
            stage2: self.stage2.clone(),
        }
    }

    /// Rebuild a project-scoped definition from a sidecar entry
    pub fn from_snapshot(id: impl Into<String>, snapshot: AnalysisSnapshot) -> Self {
        Self {
            id: id.into(),
            name: snapshot.name,
            is_project_scoped: true,
            stage1: snapshot.stage1,
            stage2: snapshot.stage2,
        }
    }
}

/// Definition data embedded in a stored result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSnapshot {
    pub name: String,
    pub stage1: StageConfig,
    pub stage2: StageConfig,
}

/// Partial update of an analysis definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisDefinitionPatch {
    pub name: Option<String>,
    pub stage1: Option<StageConfig>,
    pub stage2: Option<StageConfig>,
}

impl AnalysisDefinitionPatch {
    pub fn apply_to(self, definition: &mut AnalysisDefinition) {
        if let Some(name) = self.name {
            definition.name = name;
        }
        if let Some(stage1) = self.stage1 {
            definition.stage1 = stage1;
        }
        if let Some(stage2) = self.stage2 {
            definition.stage2 = stage2;
        }
    }
}

/// Outcome of processing one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Success,
    Error,
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileStatus::Success => write!(f, "success"),
            FileStatus::Error => write!(f, "error"),
        }
    }
}

/// Result for one file of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerFileResult {
    /// Path relative to the project root, `/`-separated
    pub relative_path: String,
    /// Sanitized model output, or the error message
    pub content: String,
    /// SHA-256 of the file content; empty when it could not be computed
    pub content_hash: String,
    pub status: FileStatus,
}

impl PerFileResult {
    pub fn success(
        relative_path: impl Into<String>,
        content: impl Into<String>,
        content_hash: impl Into<String>,
    ) -> Self {
        Self {
            relative_path: relative_path.into(),
            content: content.into(),
            content_hash: content_hash.into(),
            status: FileStatus::Success,
        }
    }

    pub fn error(
        relative_path: impl Into<String>,
        message: impl Into<String>,
        content_hash: impl Into<String>,
    ) -> Self {
        Self {
            relative_path: relative_path.into(),
            content: message.into(),
            content_hash: content_hash.into(),
            status: FileStatus::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FileStatus::Success
    }
}

/// Stored result of one analysis run; one per analysis id, last run wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub analysis_id: String,
    #[serde(default)]
    pub per_file_results: Vec<PerFileResult>,
    #[serde(default)]
    pub summary_text: String,
    #[serde(rename = "completedAtEpochMs", default)]
    pub completed_at_ms: i64,
    /// Set when the summary stage failed and stage-1 results were kept
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_error: Option<String>,
    /// Definition that produced this result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<AnalysisSnapshot>,
}

impl AnalysisResult {
    pub fn error_count(&self) -> usize {
        self.per_file_results.iter().filter(|r| !r.is_success()).count()
    }

    pub fn success_count(&self) -> usize {
        self.per_file_results.iter().filter(|r| r.is_success()).count()
    }

    /// Whether the summary stage produced text
    pub fn has_summary(&self) -> bool {
        self.summary_error.is_none()
    }
}
