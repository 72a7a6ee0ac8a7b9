// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;
use tempfile::tempdir;
use wd_core::test_support::config;

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

#[test]
fn load_missing_file_is_empty() {
    let dir = tempdir().unwrap();
    let states = PersistedStates::load(&dir.path().join("state.json")).unwrap();
    assert!(states.is_empty());
    assert!(!states.contains(&config("x", "a"), &[JobState::Success, JobState::Retry]));
}

#[test]
fn load_corrupt_file_errors_but_default_recovers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    fs::write(&path, b"{ not json").unwrap();

    assert!(matches!(PersistedStates::load(&path), Err(StateError::Json(_))));
    assert!(PersistedStates::load_or_default(&path).is_empty());
}

#[test]
fn load_reads_module_then_job_name() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    fs::write(&path, br#"{"nginx": {"local": "success", "remote": "failed"}}"#).unwrap();

    let states = PersistedStates::load(&path).unwrap();
    assert_eq!(states.len(), 2);
    assert!(states.contains(&config("nginx", "local"), &[JobState::Success, JobState::Retry]));
    assert!(!states.contains(&config("nginx", "remote"), &[JobState::Success, JobState::Retry]));
    assert_eq!(states.lookup(&config("redis", "local")), None);
}

#[test]
fn save_overwrites_and_remove_prunes_empty_modules() {
    let dir = tempdir().unwrap();
    let manager = StateManager::new(dir.path().join("state.json"));
    let cfg = config("x", "a");

    manager.save(&cfg, JobState::Retry);
    manager.save(&cfg, JobState::Failed);
    assert_eq!(manager.lookup(&cfg), Some(JobState::Failed));

    manager.remove(&cfg);
    assert_eq!(manager.lookup(&cfg), None);
    manager.flush().unwrap();
    assert_eq!(read_json(manager.path()), serde_json::json!({}));
}

#[test]
fn unchanged_save_does_not_mark_dirty() {
    let dir = tempdir().unwrap();
    let manager = StateManager::new(dir.path().join("state.json"));
    let cfg = config("x", "a");

    manager.save(&cfg, JobState::Success);
    manager.dirty.store(false, Ordering::Release);
    manager.save(&cfg, JobState::Success);
    assert!(!manager.dirty.load(Ordering::Acquire));

    manager.remove(&config("x", "missing"));
    assert!(!manager.dirty.load(Ordering::Acquire));
}

#[tokio::test(start_paused = true)]
async fn flush_tick_writes_latest_state_per_job() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    let prior = PersistedStates::load(&path).unwrap();
    assert!(prior.is_empty());

    let manager = Arc::new(StateManager::new(&path));
    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let manager = Arc::clone(&manager);
        let cancel = cancel.clone();
        async move { manager.run(cancel).await }
    });

    manager.save(&config("x", "a"), JobState::Retry);
    manager.save(&config("x", "a"), JobState::Success);
    manager.save(&config("y", "b"), JobState::BuildError);
    assert!(!path.exists(), "writes are debounced until the next tick");

    tokio::time::sleep(DEFAULT_FLUSH_INTERVAL + Duration::from_millis(10)).await;
    assert_eq!(
        read_json(&path),
        serde_json::json!({"x": {"a": "success"}, "y": {"b": "build_error"}})
    );

    manager.save(&config("y", "b"), JobState::Failed);
    cancel.cancel();
    handle.await.unwrap();
    assert_eq!(read_json(&path)["y"]["b"], "failed", "shutdown performs a final flush");
}

#[test]
fn flush_output_is_indented() {
    let dir = tempdir().unwrap();
    let manager = StateManager::new(dir.path().join("nested").join("state.json"));
    manager.save(&config("x", "a"), JobState::Success);
    manager.flush().unwrap();

    let text = fs::read_to_string(manager.path()).unwrap();
    assert!(text.contains("\n  \"x\": {"));
    assert!(!manager.path().with_extension("tmp").exists());
}
