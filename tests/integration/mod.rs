//! Integration Tests Module
//!
//! End-to-end tests driving the application state against temporary
//! project folders and a scripted completion provider.

// Scripted provider and app state harness
mod support;

// Selection, scheduling, message protocol and progress
mod pipeline_test;



// Incremental plugin runs
mod plugin_test;
