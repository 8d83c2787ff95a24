//! Data Models
//!
//! Contains all data structures used throughout the application.

pub mod analysis;
pub mod model_binding;
pub mod plugin;
pub mod settings;
pub mod sidecar;

pub use analysis::*;
pub use model_binding::*;
pub use plugin::*;
pub use settings::*;
pub use sidecar::*;
