// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for the specs.

pub use std::path::{Path, PathBuf};
pub use std::time::Duration;

/// Upper bound for any single wait in a spec.
pub const SPEC_WAIT_MAX_MS: u64 = 10_000;

/// A scratch directory laid out like a Warden install.
pub struct Project {
    dir: tempfile::TempDir,
}

impl Project {
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("jobs")).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Glob matching every job file of the project.
    pub fn jobs_pattern(&self) -> String {
        format!("{}/jobs/*.toml", self.path().display())
    }

    pub fn state_path(&self) -> PathBuf {
        self.path().join("state/job_states.json")
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.path().join("locks")
    }

    /// Write `content` to `rel`, replacing the file in one step.
    pub fn file(&self, rel: &str, content: &str) {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let tmp = path.with_extension("partial");
        std::fs::write(&tmp, content).unwrap();
        std::fs::rename(&tmp, &path).unwrap();
    }

    pub fn remove(&self, rel: &str) {
        std::fs::remove_file(self.path().join(rel)).unwrap();
    }

    /// Daemon configuration reading the project's job files once.
    pub fn daemon_config(&self, modules: &[&str]) -> wd_daemon::Config {
        wd_daemon::Config {
            patterns: vec![self.jobs_pattern()],
            watch: false,
            modules: modules.iter().map(|m| m.to_string()).collect(),
            state_path: self.state_path(),
            lock_dir: self.lock_dir(),
            vnode_dir: None,
        }
    }

    /// Parsed job state file, `Null` when nothing was written yet.
    pub fn states(&self) -> serde_json::Value {
        read_states(&self.state_path())
    }
}

pub fn read_states(path: &Path) -> serde_json::Value {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap(),
        Err(_) => serde_json::Value::Null,
    }
}

/// Poll `cond` until it holds or `max_ms` elapses.
pub async fn wait_for(max_ms: u64, cond: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(max_ms);
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    cond()
}
