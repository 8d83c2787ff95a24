//! Storage Layer
//!
//! Handles all data persistence: JSON config, the per-user key-value store
//! and the per-project sidecar document.

pub mod config;
pub mod kv_store;
pub mod sidecar_file;

pub use config::*;
pub use kv_store::*;
pub use sidecar_file::*;
