//! CodeAsk LLM
//!
//! The text-completion collaborator used by the analysis engine:
//! - `LlmProvider` trait (single request/response, no streaming)
//! - OpenAI-compatible chat completions provider
//! - HTTP client factory
//!
//! Every model binding in CodeAsk points at an OpenAI-compatible endpoint
//! (OpenAI, DeepSeek, Qwen compatible mode, Ollama `/v1`, vLLM, ...), so one
//! provider implementation covers all of them.

pub mod http_client;
pub mod openai;
pub mod provider;
pub mod types;

// Re-export main types
pub use http_client::build_http_client;
pub use openai::OpenAICompatibleProvider;
pub use provider::LlmProvider;
pub use types::*;
