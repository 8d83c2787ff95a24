//! Analysis Services
//!
//! Two-stage batch analysis: per-file calls, a summary call, progress and
//! orchestration.

pub mod executor;
pub mod pipeline;
pub mod progress;

pub use executor::{AnalysisExecutor, ExecutionOptions, RunOutcome};
pub use pipeline::{AnalysisPipeline, OpenAIProviderFactory, ProviderFactory, RunOptions, Stage1Outcome};
pub use progress::{AnalysisProgress, AnalysisStage, ProgressSplit};
