//! CodeAsk Desktop - Rust Backend Library
//!
//! Batch analysis engine behind the CodeAsk desktop application. It includes:
//! - Storage layer (JSON config, per-user key-value store, project sidecar)
//! - Analysis, plugin and registry services
//! - Session state wiring the services together
//! - Data models and utilities

pub mod models;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

pub use models::settings::{AppConfig, PartialResultPolicy, SettingsUpdate};
pub use state::{AppState, OpenProject, Services};
pub use utils::error::{AppError, AppResult};
