//! Plugin Run Integration Tests
//!
//! Incremental skipping, per-file merging and coexistence with analysis
//! results in the sidecar.

use codeask_desktop::models::analysis::FileStatus;
use codeask_desktop::models::plugin::PluginExecution;
use codeask_desktop::services::PluginRunOutcome;
use codeask_desktop::{AppError, AppResult};

use crate::support::{Harness, ScriptedProvider};

async fn run_plugin(h: &Harness, plugin_id: &str, incremental: bool) -> AppResult<PluginRunOutcome> {
    h.state.run_plugin(plugin_id, incremental, None, |_| {}).await
}

fn stored_execution(h: &Harness, plugin_id: &str) -> PluginExecution {
    serde_json::from_value(h.sidecar()["pluginExecutions"][plugin_id].clone()).unwrap()
}

#[tokio::test]
async fn test_first_run_processes_everything() {
    let h = Harness::new(ScriptedProvider::new());
    h.write("a.rs", "1");
    h.write("b.rs", "2");
    let model = h.add_model(2);
    let plugin = h.add_plugin(&model);
    h.open_all(&[]).await;

    let outcome = run_plugin(&h, &plugin, true).await.unwrap();
    assert_eq!(outcome.processed, 2);
    assert_eq!(outcome.skipped, 0);
    assert!(outcome.persisted);

    let stored = stored_execution(&h, &plugin);
    assert_eq!(stored, outcome.execution);
    assert_eq!(stored.definition.unwrap().name, "Explain");
    assert_eq!(stored.files["a.rs"].content, "Notes on a.rs");

    // single stage: no summary call
    assert!(h.provider.summary_calls().is_empty());
    assert_eq!(h.provider.calls()[0].system, "Explain this file.");
}

#[tokio::test]
async fn test_incremental_run_skips_unchanged_files() {
    let h = Harness::new(ScriptedProvider::new());
    h.write("a.rs", "1");
    h.write("b.rs", "2");
    let model = h.add_model(2);
    let plugin = h.add_plugin(&model);
    h.open_all(&[]).await;
    run_plugin(&h, &plugin, true).await.unwrap();

    h.write("b.rs", "2 changed");
    let outcome = run_plugin(&h, &plugin, true).await.unwrap();

    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.skipped, 1);
    let mut calls = h.provider.file_calls();
    calls.sort();
    assert_eq!(calls, vec!["a.rs", "b.rs", "b.rs"]);
    assert_eq!(outcome.execution.files.len(), 2);
}

#[tokio::test]
async fn test_failed_files_are_retried() {
    let h = Harness::new(ScriptedProvider::new().fail("b.rs", "rate limited"));
    h.write("a.rs", "1");
    h.write("b.rs", "2");
    let model = h.add_model(1);
    let plugin = h.add_plugin(&model);
    h.open_all(&[]).await;

    let first = run_plugin(&h, &plugin, true).await.unwrap();
    assert_eq!(first.execution.files["b.rs"].status, FileStatus::Error);

    let second = run_plugin(&h, &plugin, true).await.unwrap();
    assert_eq!(second.processed, 1);
    assert_eq!(second.skipped, 1);
}

#[tokio::test]
async fn test_full_run_ignores_stored_results() {
    let h = Harness::new(ScriptedProvider::new());
    h.write("a.rs", "1");
    let model = h.add_model(1);
    let plugin = h.add_plugin(&model);
    h.open_all(&[]).await;

    run_plugin(&h, &plugin, true).await.unwrap();
    let outcome = run_plugin(&h, &plugin, false).await.unwrap();

    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.skipped, 0);
    assert_eq!(h.provider.file_calls().len(), 2);
}

#[tokio::test]
async fn test_partial_selection_merges_with_stored_files() {
    let h = Harness::new(ScriptedProvider::new());
    h.write("a.rs", "1");
    h.write("b.rs", "2");
    let model = h.add_model(1);
    let plugin = h.add_plugin(&model);
    h.open_all(&[]).await;
    run_plugin(&h, &plugin, false).await.unwrap();

    h.state.select_all(false).await.unwrap();
    let a = h.root().join("a.rs").to_string_lossy().to_string();
    h.state.toggle_selection(&a, true).await.unwrap();
    let outcome = run_plugin(&h, &plugin, false).await.unwrap();

    assert_eq!(outcome.processed, 1);
    let stored = stored_execution(&h, &plugin);
    assert_eq!(stored.files.len(), 2);
    assert!(stored.files.contains_key("b.rs"));
}

#[tokio::test]
async fn test_plugin_and_analysis_sections_coexist() {
    let h = Harness::new(ScriptedProvider::new());
    h.write("a.rs", "1");
    let model = h.add_model(1);
    let plugin = h.add_plugin(&model);
    let analysis = h.add_analysis(&model);
    h.open_all(&[]).await;

    run_plugin(&h, &plugin, true).await.unwrap();
    h.run(&analysis).await.0.unwrap();
    run_plugin(&h, &plugin, false).await.unwrap();

    let doc = h.sidecar();
    assert!(doc["analysisResults"].get(&analysis).is_some());
    assert!(doc["pluginExecutions"].get(&plugin).is_some());
}

#[tokio::test]
async fn test_unknown_plugin() {
    let h = Harness::new(ScriptedProvider::new());
    h.write("a.rs", "1");
    h.open_all(&[]).await;

    let err = run_plugin(&h, "missing", true).await.unwrap_err();
    assert!(matches!(err, AppError::PluginNotFound(_)));
    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn test_incremental_skip_for_non_utf8_file() {
    let h = Harness::new(ScriptedProvider::new());
    h.write_bytes("latin1.c", b"/* caf\xe9 */ int x;");
    let model = h.add_model(1);
    let plugin = h.add_plugin(&model);
    h.open_all(&[]).await;

    let first = run_plugin(&h, &plugin, true).await.unwrap();
    assert!(first.execution.files["latin1.c"].is_success());

    let second = run_plugin(&h, &plugin, true).await.unwrap();
    assert_eq!(second.processed, 0);
    assert_eq!(second.skipped, 1);
}
