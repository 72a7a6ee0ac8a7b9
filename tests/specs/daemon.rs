// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon specs
//!
//! Run whole daemons against scratch directories and check what they leave
//! in the job state file.

use crate::prelude::*;
use wd_adapters::{FileLockRegistry, Registry};
use wd_daemon::startup;

const TWO_JOBS: &str = r#"
[[jobs]]
name = "ok"

[[jobs]]
name = "broken"
fail_check = true
"#;

#[tokio::test]
async fn daemon_records_job_states_and_releases_locks() {
    let project = Project::empty();
    project.file("jobs/example.toml", TWO_JOBS);
    let config = project.daemon_config(&[]);

    let daemon = startup(&config).unwrap();
    daemon.run(tokio::time::sleep(Duration::from_secs(1))).await.unwrap();

    let states = project.states();
    assert_eq!(states["example"]["ok"], "success");
    assert_eq!(states["example"]["broken"], "failed");

    let other = FileLockRegistry::new(project.lock_dir());
    assert!(other.register("example_ok").unwrap());
}

#[tokio::test]
async fn second_daemon_sees_duplicate_global() {
    let project = Project::empty();
    project.file("jobs/example.toml", "[[jobs]]\nname = \"shared\"\n");
    let first = project.daemon_config(&[]);
    let mut second = project.daemon_config(&[]);
    second.state_path = project.path().join("second/job_states.json");

    let a = startup(&first).unwrap();
    let b = startup(&second).unwrap();
    let (ra, rb) = tokio::join!(a.run(tokio::time::sleep(Duration::from_secs(3))), async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        b.run(tokio::time::sleep(Duration::from_secs(1))).await
    });
    ra.unwrap();
    rb.unwrap();

    assert_eq!(read_states(&first.state_path)["example"]["shared"], "success");
    assert_eq!(read_states(&second.state_path)["example"]["shared"], "duplicate_global");
}

#[tokio::test]
async fn previously_healthy_job_is_retried_after_restart() {
    let project = Project::empty();
    project.file("state/job_states.json", r#"{ "example": { "flaky": "success" } }"#);
    project.file("jobs/example.toml", "[[jobs]]\nname = \"flaky\"\nfail_check = true\n");
    let config = project.daemon_config(&[]);

    let daemon = startup(&config).unwrap();
    daemon.run(tokio::time::sleep(Duration::from_secs(1))).await.unwrap();

    assert_eq!(project.states()["example"]["flaky"], "retry");
}

#[tokio::test]
async fn enabled_module_runs_without_job_file() {
    let project = Project::empty();
    let mut config = project.daemon_config(&["all"]);
    config.patterns.clear();

    let daemon = startup(&config).unwrap();
    daemon.run(tokio::time::sleep(Duration::from_secs(1))).await.unwrap();

    similar_asserts::assert_eq!(project.states(), serde_json::json!({ "example": { "example": "success" } }));
}

#[tokio::test]
async fn watching_daemon_picks_up_new_job_file() {
    let project = Project::empty();
    let mut config = project.daemon_config(&[]);
    config.watch = true;

    let daemon = startup(&config).unwrap();
    daemon
        .run(async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            project.file("jobs/example.toml", "[[jobs]]\nname = \"late\"\n");
            tokio::time::sleep(Duration::from_secs(2)).await;
        })
        .await
        .unwrap();

    assert_eq!(project.states()["example"]["late"], "success");
}
