//! Services
//!
//! Business logic services for the application.
//! Services own the analysis engine and are called by the app state.

pub mod analysis;
pub mod file_system;
pub mod hasher;
pub mod model_registry;
pub mod notifier;
pub mod plugin_runner;
pub mod registry;
pub mod result_store;
pub mod sanitize;

pub use analysis::{AnalysisExecutor, AnalysisPipeline, ExecutionOptions, ProviderFactory, RunOutcome};
pub use file_system::{FileSystem, LocalFileSystem};
pub use model_registry::ModelRegistry;
pub use notifier::{ChannelNotifier, CollectingNotifier, Notification, NotificationLevel, Notifier, TracingNotifier};
pub use plugin_runner::{PluginRunOutcome, PluginRunner};
pub use registry::{AnalysisRegistry, Definition, DefinitionRegistry, PluginRegistry};
pub use result_store::ResultStore;
