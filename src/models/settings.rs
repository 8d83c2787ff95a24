//! Settings Models
//!
//! Application configuration and settings data structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What to persist when the summary stage fails after stage 1 completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PartialResultPolicy {
    /// Persist nothing; the run is all-or-nothing
    #[default]
    Discard,
    /// Persist stage-1 results with an empty summary and the stage-2 error
    PersistStage1,
}

/// Application configuration stored in config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Share of the progress range (0-100] occupied by the per-file stage
    #[serde(default = "default_stage1_progress_share")]
    pub stage1_progress_share: f64,
    /// Per model call timeout in seconds; 0 disables the timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Persistence behavior when the summary stage fails
    #[serde(default)]
    pub partial_result_policy: PartialResultPolicy,
    /// Extension filter applied when a project is opened
    #[serde(default)]
    pub default_extensions: Vec<String>,
}

fn default_stage1_progress_share() -> f64 {
    90.0
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stage1_progress_share: default_stage1_progress_share(),
            request_timeout_secs: default_request_timeout_secs(),
            partial_result_policy: PartialResultPolicy::default(),
            default_extensions: Vec::new(),
        }
    }
}

/// Settings update request (partial update)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub stage1_progress_share: Option<f64>,
    pub request_timeout_secs: Option<u64>,
    pub partial_result_policy: Option<PartialResultPolicy>,
    pub default_extensions: Option<Vec<String>>,
}

impl AppConfig {
    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: SettingsUpdate) {
        if let Some(share) = update.stage1_progress_share {
            self.stage1_progress_share = share;
        }
        if let Some(timeout) = update.request_timeout_secs {
            self.request_timeout_secs = timeout;
        }
        if let Some(policy) = update.partial_result_policy {
            self.partial_result_policy = policy;
        }
        if let Some(extensions) = update.default_extensions {
            self.default_extensions = extensions;
        }
    }

    /// Per-call timeout, `None` when disabled
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.stage1_progress_share > 0.0 && self.stage1_progress_share <= 100.0) {
            return Err(format!(
                "stage1ProgressShare must be in (0, 100], got {}",
                self.stage1_progress_share
            ));
        }

        if self.request_timeout_secs > 24 * 60 * 60 {
            return Err("requestTimeoutSecs cannot exceed one day".to_string());
        }

        Ok(())
    }
}
