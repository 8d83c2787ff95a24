//! Analysis Pipeline Integration Tests
//!
//! End-to-end runs through the app state with a scripted completion
//! provider: selection, message protocol, per-file failures, chunking,
//! summary stage and progress.

use std::time::Duration;

use codeask_desktop::models::analysis::{FileStatus, PerFileResult};
use codeask_desktop::models::model_binding::ModelBindingUpdate;
use codeask_desktop::models::settings::SettingsUpdate;
use codeask_desktop::services::analysis::AnalysisStage;
use codeask_desktop::services::hasher::hash_bytes;
use codeask_desktop::services::notifier::NotificationLevel;
use codeask_desktop::AppError;
use tokio_util::sync::CancellationToken;

use crate::support::{Event, Harness, ScriptedProvider, STAGE1_PROMPT, STAGE2_PROMPT};

fn position(events: &[Event], event: Event) -> usize {
    events
        .iter()
        .position(|e| *e == event)
        .unwrap_or_else(|| panic!("missing event {:?}", event))
}

// ============================================================================
// Selection feeding stage 1
// ============================================================================

#[tokio::test]
async fn test_extension_filter_limits_stage1_input() {
    let h = Harness::new(ScriptedProvider::new());
    h.write("a.ts", "X");
    h.write("b.md", "Y");
    let model = h.add_model(2);
    let analysis = h.add_analysis(&model);

    h.open_all(&[".ts"]).await;
    let (outcome, _) = h.run(&analysis).await;
    let outcome = outcome.unwrap();

    assert_eq!(outcome.result.per_file_results.len(), 1);
    assert_eq!(outcome.result.per_file_results[0].relative_path, "a.ts");
    assert_eq!(h.provider.file_calls(), vec!["a.ts".to_string()]);
}

#[tokio::test]
async fn test_message_protocol() {
    let h = Harness::new(ScriptedProvider::new());
    h.write("a.ts", "X");
    let model = h.add_model(1);
    let analysis = h.add_analysis(&model);

    h.open_all(&[]).await;
    h.run(&analysis).await.0.unwrap();

    let calls = h.provider.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].system, STAGE1_PROMPT);
    assert_eq!(calls[0].user, "File: a.ts\n\nCode:\nX");
    assert_eq!(calls[1].system, STAGE2_PROMPT);
}

#[tokio::test]
async fn test_files_processed_in_tree_order() {
    let h = Harness::new(ScriptedProvider::new());
    h.write("z.rs", "");
    h.write("src/b.rs", "");
    h.write("src/a.rs", "");
    h.write("m.rs", "");
    let model = h.add_model(1);
    let analysis = h.add_analysis(&model);

    h.open_all(&[]).await;
    let outcome = h.run(&analysis).await.0.unwrap();

    let order: Vec<_> = outcome
        .result
        .per_file_results
        .iter()
        .map(|r| r.relative_path.as_str())
        .collect();
    assert_eq!(order, vec!["src/a.rs", "src/b.rs", "m.rs", "z.rs"]);
}

#[tokio::test]
async fn test_partial_selection() {
    let h = Harness::new(ScriptedProvider::new());
    h.write("src/a.rs", "");
    h.write("src/b.rs", "");
    h.write("docs/readme.md", "");
    let model = h.add_model(1);
    let analysis = h.add_analysis(&model);

    h.state.open_project(&h.root(), None).await.unwrap();
    let src = h.root().join("src").to_string_lossy().to_string();
    h.state.toggle_selection(&src, true).await.unwrap();

    let outcome = h.run(&analysis).await.0.unwrap();
    assert_eq!(outcome.result.per_file_results.len(), 2);
    assert!(outcome
        .result
        .per_file_results
        .iter()
        .all(|r| r.relative_path.starts_with("src/")));
}

// ============================================================================
// Per-file failure isolation
// ============================================================================

#[tokio::test]
async fn test_single_file_failure_is_recorded() {
    let h = Harness::new(ScriptedProvider::new().fail("c.py", "quota exceeded"));
    h.write("a.py", "1");
    h.write("b.py", "2");
    h.write("c.py", "3");
    let model = h.add_model(3);
    let analysis = h.add_analysis(&model);

    h.open_all(&[]).await;
    let outcome = h.run(&analysis).await.0.unwrap();
    let results = &outcome.result.per_file_results;

    assert_eq!(results.len(), 3);
    let errors: Vec<&PerFileResult> = results.iter().filter(|r| r.status == FileStatus::Error).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].relative_path, "c.py");
    assert_eq!(errors[0].content, "quota exceeded");
    // hash is re-fetched for the failed file
    assert_eq!(errors[0].content_hash.len(), 64);
    assert!(outcome.persisted);

    // one error per failed file plus one completion notice
    assert_eq!(h.notifier.count(NotificationLevel::Error), 1);
    assert_eq!(h.notifier.count(NotificationLevel::Info), 1);
}

#[tokio::test]
async fn test_non_utf8_file_is_analyzed() {
    let h = Harness::new(ScriptedProvider::new());
    let bytes: &[u8] = b"/* caf\xe9 */ int x;";
    h.write_bytes("latin1.c", bytes);
    let model = h.add_model(1);
    let analysis = h.add_analysis(&model);

    h.open_all(&[]).await;
    let outcome = h.run(&analysis).await.0.unwrap();
    let result = &outcome.result.per_file_results[0];

    assert!(result.is_success());
    assert_eq!(result.content_hash, hash_bytes(bytes));
    assert_eq!(
        h.provider.calls()[0].user,
        "File: latin1.c\n\nCode:\n/* caf\u{fffd} */ int x;"
    );
}

#[tokio::test]
async fn test_failed_entry_hashes_raw_bytes() {
    let h = Harness::new(ScriptedProvider::new().fail("latin1.c", "quota exceeded"));
    let bytes: &[u8] = b"/* caf\xe9 */ int x;";
    h.write_bytes("latin1.c", bytes);
    let model = h.add_model(1);
    let analysis = h.add_analysis(&model);

    h.open_all(&[]).await;
    let outcome = h.run(&analysis).await.0.unwrap();
    let result = &outcome.result.per_file_results[0];

    assert_eq!(result.status, FileStatus::Error);
    assert_eq!(result.content, "quota exceeded");
    assert_eq!(result.content_hash, hash_bytes(bytes));
}

#[tokio::test]
async fn test_summary_receives_all_entries_including_errors() {
    let h = Harness::new(ScriptedProvider::new().fail("b.py", "boom"));
    h.write("a.py", "1");
    h.write("b.py", "2");
    let model = h.add_model(2);
    let analysis = h.add_analysis(&model);

    h.open_all(&[]).await;
    let outcome = h.run(&analysis).await.0.unwrap();

    let summary_calls = h.provider.summary_calls();
    assert_eq!(summary_calls.len(), 1);
    let sent: Vec<PerFileResult> = serde_json::from_str(&summary_calls[0].user).unwrap();
    assert_eq!(sent, outcome.result.per_file_results);
    assert_eq!(sent.iter().filter(|r| !r.is_success()).count(), 1);
}

#[tokio::test]
async fn test_responses_are_sanitized() {
    let provider = ScriptedProvider::new()
        .respond("a.ts", "<think>\nlet me look\n</think>\n```markdown\n# Parser\n```")
        .summary("<think>x</think>```\nAll good\n```");
    let h = Harness::new(provider);
    h.write("a.ts", "X");
    let model = h.add_model(1);
    let analysis = h.add_analysis(&model);

    h.open_all(&[]).await;
    let outcome = h.run(&analysis).await.0.unwrap();

    assert_eq!(outcome.result.per_file_results[0].content, "# Parser");
    assert_eq!(outcome.result.summary_text, "All good");
}

// ============================================================================
// Chunked scheduling
// ============================================================================

#[tokio::test]
async fn test_chunk_boundaries() {
    let provider = ScriptedProvider::new()
        .delay("f0.txt", Duration::from_millis(60))
        .delay("f1.txt", Duration::from_millis(10))
        .delay("f2.txt", Duration::from_millis(40))
        .delay("f3.txt", Duration::from_millis(5))
        .delay("f4.txt", Duration::from_millis(1));
    let h = Harness::new(provider);
    for i in 0..5 {
        h.write(&format!("f{}.txt", i), &i.to_string());
    }
    let model = h.add_model(2);
    let analysis = h.add_analysis(&model);

    h.open_all(&[]).await;
    let outcome = h.run(&analysis).await.0.unwrap();

    let events = h.provider.events();
    let start = |i: usize| position(&events, Event::Start(format!("f{}.txt", i)));
    let end = |i: usize| position(&events, Event::End(format!("f{}.txt", i)));

    // chunk [0, 1] fully settles before [2, 3] starts
    assert!(start(2) > end(0) && start(2) > end(1));
    assert!(start(3) > end(0) && start(3) > end(1));
    // chunk [4] waits for the slow f2 even though f3 finished early
    assert!(start(4) > end(2) && start(4) > end(3));

    let order: Vec<_> = outcome
        .result
        .per_file_results
        .iter()
        .map(|r| r.relative_path.clone())
        .collect();
    assert_eq!(order, vec!["f0.txt", "f1.txt", "f2.txt", "f3.txt", "f4.txt"]);
}

// ============================================================================
// Progress
// ============================================================================

#[tokio::test]
async fn test_progress_split() {
    let h = Harness::new(ScriptedProvider::new());
    for name in ["a.rs", "b.rs", "c.rs", "d.rs"] {
        h.write(name, "");
    }
    let model = h.add_model(2);
    let analysis = h.add_analysis(&model);

    h.open_all(&[]).await;
    let (outcome, progress) = h.run(&analysis).await;
    outcome.unwrap();

    let stage1: Vec<f64> = progress
        .iter()
        .filter(|p| p.stage == AnalysisStage::Stage1)
        .map(|p| p.percent)
        .collect();
    assert_eq!(stage1, vec![0.0, 22.5, 45.0, 67.5, 90.0]);
    assert!(progress.windows(2).all(|w| w[0].percent <= w[1].percent));

    let last = progress.last().unwrap();
    assert_eq!(last.stage, AnalysisStage::Done);
    assert_eq!(last.percent, 100.0);
}

#[tokio::test]
async fn test_configured_progress_share() {
    let h = Harness::new(ScriptedProvider::new());
    h.write("a.rs", "");
    h.write("b.rs", "");
    let model = h.add_model(1);
    let analysis = h.add_analysis(&model);
    h.state
        .update_config(SettingsUpdate {
            stage1_progress_share: Some(50.0),
            ..Default::default()
        })
        .await
        .unwrap();

    h.open_all(&[]).await;
    let (_, progress) = h.run(&analysis).await;
    let stage1_max = progress
        .iter()
        .filter(|p| p.stage == AnalysisStage::Stage1)
        .map(|p| p.percent)
        .fold(0.0, f64::max);
    assert_eq!(stage1_max, 50.0);
}

// ============================================================================
// Preconditions
// ============================================================================

#[tokio::test]
async fn test_unknown_analysis() {
    let h = Harness::new(ScriptedProvider::new());
    h.write("a.rs", "");
    h.open_all(&[]).await;

    let (outcome, _) = h.run("missing").await;
    assert!(matches!(outcome, Err(AppError::AnalysisNotFound(_))));
    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn test_dangling_model_aborts_before_work() {
    let h = Harness::new(ScriptedProvider::new());
    h.write("a.rs", "");
    let analysis = h.add_analysis("ghost-model");
    h.open_all(&[]).await;

    let (outcome, progress) = h.run(&analysis).await;
    assert!(matches!(outcome, Err(AppError::ModelNotFound(id)) if id == "ghost-model"));
    assert!(h.provider.calls().is_empty());
    assert!(progress.is_empty());
}

#[tokio::test]
async fn test_disabled_model_aborts_before_work() {
    let h = Harness::new(ScriptedProvider::new());
    h.write("a.rs", "");
    let model = h.add_model(1);
    let analysis = h.add_analysis(&model);
    h.state
        .models()
        .update(
            &model,
            ModelBindingUpdate {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
    h.open_all(&[]).await;

    let (outcome, _) = h.run(&analysis).await;
    assert!(matches!(outcome, Err(AppError::Validation(_))));
    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn test_run_requires_open_project() {
    let h = Harness::new(ScriptedProvider::new());
    let model = h.add_model(1);
    let analysis = h.add_analysis(&model);

    let (outcome, _) = h.run(&analysis).await;
    assert!(matches!(outcome, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_empty_selection_still_summarizes() {
    let h = Harness::new(ScriptedProvider::new());
    h.write("a.rs", "");
    let model = h.add_model(1);
    let analysis = h.add_analysis(&model);
    h.state.open_project(&h.root(), None).await.unwrap();

    let (outcome, progress) = h.run(&analysis).await;
    let outcome = outcome.unwrap();
    assert!(outcome.result.per_file_results.is_empty());
    assert_eq!(h.provider.summary_calls()[0].user, "[]");
    assert_eq!(progress[0].percent, 90.0);
}

// ============================================================================
// Timeouts and cancellation
// ============================================================================

#[tokio::test]
async fn test_per_call_timeout_yields_error_entry() {
    let provider = ScriptedProvider::new().delay("slow.rs", Duration::from_millis(2500));
    let h = Harness::new(provider);
    h.write("fast.rs", "");
    h.write("slow.rs", "");
    let model = h.add_model(2);
    let analysis = h.add_analysis(&model);
    h.state
        .update_config(SettingsUpdate {
            request_timeout_secs: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();

    h.open_all(&[]).await;
    let outcome = h.run(&analysis).await.0.unwrap();
    let results = &outcome.result.per_file_results;

    assert!(results[0].is_success());
    assert_eq!(results[1].relative_path, "slow.rs");
    assert_eq!(results[1].status, FileStatus::Error);
    assert!(results[1].content.starts_with("Timed out"));
}

#[tokio::test]
async fn test_cancel_before_start() {
    let h = Harness::new(ScriptedProvider::new());
    h.write("a.rs", "");
    h.write("b.rs", "");
    let model = h.add_model(1);
    let analysis = h.add_analysis(&model);
    h.open_all(&[]).await;

    let token = CancellationToken::new();
    token.cancel();
    let outcome = h
        .state
        .run_analysis(&analysis, Some(token), |_| {})
        .await
        .unwrap();

    assert!(outcome.cancelled);
    assert!(!outcome.persisted);
    assert!(outcome.result.per_file_results.is_empty());
    assert!(h.provider.calls().is_empty());
    assert!(h.state.results().get_result(&analysis).is_none());
}

#[tokio::test]
async fn test_cancel_in_flight() {
    let provider = ScriptedProvider::new()
        .delay("a.rs", Duration::from_millis(400))
        .delay("b.rs", Duration::from_millis(400));
    let h = Harness::new(provider);
    h.write("a.rs", "");
    h.write("b.rs", "");
    h.write("c.rs", "");
    let model = h.add_model(2);
    let analysis = h.add_analysis(&model);
    h.open_all(&[]).await;

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let outcome = h
        .state
        .run_analysis(&analysis, Some(token), |_| {})
        .await
        .unwrap();

    assert!(outcome.cancelled);
    let results = &outcome.result.per_file_results;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.content == "Analysis cancelled"));
    assert!(h.provider.summary_calls().is_empty());
    assert_eq!(h.notifier.count(NotificationLevel::Error), 0);
    assert_eq!(h.notifier.count(NotificationLevel::Warning), 1);
}

#[tokio::test]
async fn test_cancel_during_summary() {
    let provider = ScriptedProvider::new().summary_delay(Duration::from_millis(500));
    let h = Harness::new(provider);
    h.write("a.rs", "");
    let model = h.add_model(1);
    let analysis = h.add_analysis(&model);
    h.open_all(&[]).await;

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let outcome = h
        .state
        .run_analysis(&analysis, Some(token), |_| {})
        .await
        .unwrap();

    assert!(outcome.cancelled);
    assert!(!outcome.persisted);
    assert_eq!(outcome.result.per_file_results.len(), 1);
    assert!(outcome.result.per_file_results[0].is_success());
    assert!(h.sidecar()["analysisResults"].get(&analysis).is_none());
}
