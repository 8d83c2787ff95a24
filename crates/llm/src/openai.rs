//! OpenAI-Compatible Provider
//!
//! Implementation of the LlmProvider trait for any endpoint speaking the
//! OpenAI chat completions protocol. Non-streaming only.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::provider::{missing_api_key_error, parse_http_error, LlmProvider};
use super::types::{
    LlmError, LlmRequestOptions, LlmResponse, LlmResult, Message, ProviderConfig, UsageStats,
};
use crate::http_client::build_http_client;

/// Default OpenAI API base
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Path appended to the base URL
const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// Provider for OpenAI-compatible endpoints
pub struct OpenAICompatibleProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAICompatibleProvider {
    /// Create a new provider with the given configuration
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let client = build_http_client(config.timeout_secs.map(Duration::from_secs))?;
        Ok(Self { config, client })
    }

    /// Resolve the chat completions endpoint.
    ///
    /// A base URL that already ends in `/chat/completions` is used verbatim.
    pub fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(OPENAI_API_BASE)
            .trim_end_matches('/');

        if base.ends_with(CHAT_COMPLETIONS_PATH) {
            base.to_string()
        } else {
            format!("{}{}", base, CHAT_COMPLETIONS_PATH)
        }
    }

    /// Build the request body for the API
    fn build_request_body(
        &self,
        messages: &[Message],
        system: Option<&str>,
        request_options: &LlmRequestOptions,
    ) -> serde_json::Value {
        let mut openai_messages: Vec<serde_json::Value> = Vec::with_capacity(messages.len() + 1);

        if let Some(sys) = system {
            openai_messages.push(serde_json::json!({
                "role": "system",
                "content": sys
            }));
        }

        for msg in messages {
            openai_messages.push(serde_json::json!({
                "role": msg.role.as_str(),
                "content": msg.content
            }));
        }

        serde_json::json!({
            "model": self.config.model,
            "messages": openai_messages,
            "max_tokens": request_options
                .max_tokens_override
                .unwrap_or(self.config.max_tokens),
            "temperature": request_options
                .temperature_override
                .unwrap_or(self.config.temperature),
            "stream": false,
        })
    }

    /// Parse a response from the API
    fn parse_response(&self, response: OpenAIResponse) -> LlmResponse {
        let message = response.choices.into_iter().next().and_then(|c| c.message);

        let (content, thinking) = match message {
            Some(msg) => (msg.content, msg.reasoning_content),
            None => (None, None),
        };

        let usage = response
            .usage
            .map(|u| UsageStats {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        LlmResponse {
            content,
            thinking,
            usage,
            model: response.model.unwrap_or_else(|| self.config.model.clone()),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAICompatibleProvider {
    fn name(&self) -> &'static str {
        "openai-compatible"
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
        request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        let body = self.build_request_body(&messages, system.as_deref(), &request_options);
        let endpoint = self.endpoint();
        debug!(model = %self.config.model, endpoint = %endpoint, "sending completion request");

        let mut request = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(&body);

        // Local endpoints (Ollama, vLLM) run without a key; hosted ones reject
        // the request with 401 which is mapped below.
        match self.config.api_key.as_deref() {
            Some(key) if !key.is_empty() => {
                request = request.header("Authorization", format!("Bearer {}", key));
            }
            _ if self.config.base_url.is_none() => {
                return Err(missing_api_key_error(self.name()));
            }
            _ => {}
        }

        let response = request.send().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

        if status != 200 {
            return Err(parse_http_error(status, &body_text, self.name()));
        }

        let parsed: OpenAIResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;

        Ok(self.parse_response(parsed))
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    #[serde(default)]
    message: Option<OpenAIMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}
