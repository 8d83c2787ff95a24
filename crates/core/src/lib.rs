//! CodeAsk Core
//!
//! Foundational types for the CodeAsk Desktop workspace. This crate has no
//! dependency on application-level code (storage, LLM providers, etc.).
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `tree` - File tree arena with extension filtering and hierarchical selection
//! - `batch` - Chunked, order-preserving batch scheduler

pub mod batch;
pub mod error;
pub mod tree;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── File Tree ──────────────────────────────────────────────────────────
pub use tree::{FileNode, FilterRules, NodeKind, SelectableFileNode, SelectionTree};

// ── Batch Scheduling ───────────────────────────────────────────────────
pub use batch::{run_batched, BatchOutcome, BatchScheduler};
