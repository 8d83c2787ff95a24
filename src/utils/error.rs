//! Error Handling
//!
//! Unified error types for the application.
//! Uses thiserror for ergonomic error definitions.

use std::path::Path;

use codeask_core::CoreError;
use codeask_llm::LlmError;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// A file could not be read or hashed (deleted, permission denied, not UTF-8)
    #[error("File unavailable: {path}: {message}")]
    FileUnavailable { path: String, message: String },

    /// A definition references a model binding that does not exist
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// No analysis definition with this id
    #[error("Analysis not found: {0}")]
    AnalysisNotFound(String),

    /// No plugin definition with this id
    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    /// Completion service failure, displayed with the provider's own message
    #[error(transparent)]
    Service(#[from] LlmError),

    /// Sidecar or local store read/write failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A model call or file read exceeded its time budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Run cancelled by the caller
    #[error("Analysis cancelled")]
    Cancelled,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a file unavailable error
    pub fn file_unavailable(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::FileUnavailable {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Serialization(e) => AppError::Serialization(e),
            CoreError::Validation(msg) => AppError::Validation(msg),
            CoreError::NotFound(msg) => AppError::NotFound(msg),
            CoreError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

/// Convert AppError to a string suitable for UI command responses
impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}
