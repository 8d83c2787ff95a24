//! Progress Reporting
//!
//! Maps per-file completion counts onto one visible 0-100 range. The
//! per-file stage owns the first `stage1_share` percent, the summary the rest.

use serde::{Deserialize, Serialize};

/// Stage a progress event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisStage {
    Stage1,
    Stage2,
    Done,
}

/// Progress event delivered to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisProgress {
    pub stage: AnalysisStage,
    pub percent: f64,
    pub completed_files: usize,
    pub total_files: usize,
}

/// Split of the progress range between the two stages
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSplit {
    stage1_share: f64,
}

impl Default for ProgressSplit {
    fn default() -> Self {
        Self::new(90.0)
    }
}

impl ProgressSplit {
    /// Clamped to `[0, 100]`
    pub fn new(stage1_share: f64) -> Self {
        Self {
            stage1_share: stage1_share.clamp(0.0, 100.0),
        }
    }

    pub fn stage1_share(&self) -> f64 {
        self.stage1_share
    }

    /// Percent after `completed` of `total` files. An empty run sits at the
    /// end of stage 1.
    pub fn stage1_percent(&self, completed: usize, total: usize) -> f64 {
        if total == 0 {
            return self.stage1_share;
        }
        (completed.min(total) as f64 / total as f64) * self.stage1_share
    }

    pub fn stage1(&self, completed: usize, total: usize) -> AnalysisProgress {
        AnalysisProgress {
            stage: AnalysisStage::Stage1,
            percent: self.stage1_percent(completed, total),
            completed_files: completed,
            total_files: total,
        }
    }

    pub fn stage2_started(&self, total: usize) -> AnalysisProgress {
        AnalysisProgress {
            stage: AnalysisStage::Stage2,
            percent: self.stage1_share,
            completed_files: total,
            total_files: total,
        }
    }

    pub fn done(&self, total: usize) -> AnalysisProgress {
        AnalysisProgress {
            stage: AnalysisStage::Done,
            percent: 100.0,
            completed_files: total,
            total_files: total,
        }
    }
}
