//! Model Binding Models
//!
//! A model binding is a named connection to a text-completion endpoint.
//! Analysis and plugin definitions refer to bindings by id.

use serde::{Deserialize, Serialize};

use codeask_llm::ProviderConfig;

/// Connection settings for one model
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelBinding {
    /// Unique id, generated on creation
    #[serde(default)]
    pub id: String,
    /// Model name sent to the endpoint (e.g. `gpt-4o-mini`)
    pub name: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Concurrent per-file calls allowed for this model
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_context_tokens() -> u32 {
    128_000
}

fn default_max_output_tokens() -> u32 {
    4096
}

fn default_concurrency_limit() -> usize {
    1
}

fn default_enabled() -> bool {
    true
}

impl std::fmt::Debug for ModelBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBinding")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_context_tokens", &self.max_context_tokens)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("concurrency_limit", &self.concurrency_limit)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl ModelBinding {
    /// Binding with defaults for everything but the model name and endpoint
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            api_key: String::new(),
            base_url: base_url.into(),
            temperature: default_temperature(),
            max_context_tokens: default_max_context_tokens(),
            max_output_tokens: default_max_output_tokens(),
            concurrency_limit: default_concurrency_limit(),
            enabled: default_enabled(),
        }
    }

    /// Concurrency bound used by the batch scheduler (never 0)
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency_limit.max(1)
    }

    /// Provider configuration for this binding
    pub fn to_provider_config(&self, timeout_secs: Option<u64>) -> ProviderConfig {
        ProviderConfig {
            api_key: (!self.api_key.is_empty()).then(|| self.api_key.clone()),
            base_url: (!self.base_url.is_empty()).then(|| self.base_url.clone()),
            model: self.name.clone(),
            max_tokens: self.max_output_tokens,
            temperature: self.temperature,
            timeout_secs,
        }
    }

    /// Validate the binding
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Model name is required".to_string());
        }
        if self.concurrency_limit < 1 {
            return Err("concurrencyLimit must be at least 1".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            ));
        }
        if self.max_output_tokens == 0 {
            return Err("maxOutputTokens must be positive".to_string());
        }
        Ok(())
    }
}

/// Partial update of a model binding
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelBindingUpdate {
    pub name: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_context_tokens: Option<u32>,
    pub max_output_tokens: Option<u32>,
    pub concurrency_limit: Option<usize>,
    pub enabled: Option<bool>,
}

impl ModelBindingUpdate {
    pub fn apply_to(self, binding: &mut ModelBinding) {
        if let Some(name) = self.name {
            binding.name = name;
        }
        if let Some(api_key) = self.api_key {
            binding.api_key = api_key;
        }
        if let Some(base_url) = self.base_url {
            binding.base_url = base_url;
        }
        if let Some(temperature) = self.temperature {
            binding.temperature = temperature;
        }
        if let Some(max_context_tokens) = self.max_context_tokens {
            binding.max_context_tokens = max_context_tokens;
        }
        if let Some(max_output_tokens) = self.max_output_tokens {
            binding.max_output_tokens = max_output_tokens;
        }
        if let Some(concurrency_limit) = self.concurrency_limit {
            binding.concurrency_limit = concurrency_limit;
        }
        if let Some(enabled) = self.enabled {
            binding.enabled = enabled;
        }
    }
}
