//! Plugin Models
//!
//! A plugin is a single-stage, per-file analysis. Its stored results are kept
//! per file and merged across runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::analysis::PerFileResult;

/// A named per-file prompt bound to one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDefinition {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_project_scoped: bool,
    pub model_ref: String,
    pub prompt: String,
}

impl PluginDefinition {
    pub fn new(name: impl Into<String>, model_ref: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            is_project_scoped: false,
            model_ref: model_ref.into(),
            prompt: prompt.into(),
        }
    }

    pub fn snapshot(&self) -> PluginSnapshot {
        PluginSnapshot {
            name: self.name.clone(),
            model_ref: self.model_ref.clone(),
            prompt: self.prompt.clone(),
        }
    }

    pub fn from_snapshot(id: impl Into<String>, snapshot: PluginSnapshot) -> Self {
        Self {
            id: id.into(),
            name: snapshot.name,
            is_project_scoped: true,
            model_ref: snapshot.model_ref,
            prompt: snapshot.prompt,
        }
    }
}

/// Definition data embedded in a stored plugin execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSnapshot {
    pub name: String,
    pub model_ref: String,
    pub prompt: String,
}

/// Partial update of a plugin definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDefinitionPatch {
    pub name: Option<String>,
    pub model_ref: Option<String>,
    pub prompt: Option<String>,
}

impl PluginDefinitionPatch {
    pub fn apply_to(self, definition: &mut PluginDefinition) {
        if let Some(name) = self.name {
            definition.name = name;
        }
        if let Some(model_ref) = self.model_ref {
            definition.model_ref = model_ref;
        }
        if let Some(prompt) = self.prompt {
            definition.prompt = prompt;
        }
    }
}

/// Accumulated per-file results of a plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginExecution {
    pub plugin_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<PluginSnapshot>,
    /// Keyed by relative path
    #[serde(default)]
    pub files: BTreeMap<String, PerFileResult>,
    #[serde(rename = "updatedAtEpochMs", default)]
    pub updated_at_ms: i64,
}

impl PluginExecution {
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            definition: None,
            files: BTreeMap::new(),
            updated_at_ms: 0,
        }
    }

    /// Whether `relative_path` already has a successful result for `content_hash`
    pub fn is_up_to_date(&self, relative_path: &str, content_hash: &str) -> bool {
        self.files
            .get(relative_path)
            .map(|r| r.is_success() && !content_hash.is_empty() && r.content_hash == content_hash)
            .unwrap_or(false)
    }

    /// Insert or replace the entries of `results`; other files are kept
    pub fn merge(&mut self, results: impl IntoIterator<Item = PerFileResult>) {
        for result in results {
            self.files.insert(result.relative_path.clone(), result);
        }
    }
}
