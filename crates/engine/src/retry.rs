// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delayed resubmission of configs whose auto-detection failed.

use crate::autodetect::AutoDetect;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wd_core::{Config, ConfigHash};

/// A config coming back for another detection attempt.
#[derive(Debug)]
pub struct RetryMsg {
    pub cfg: Config,
    pub token: CancellationToken,
}

/// Handle to a scheduled resubmission.
#[derive(Debug)]
pub struct RetryTask {
    token: CancellationToken,
    /// Policy the resubmitted attempt runs with
    pub policy: AutoDetect,
}

impl RetryTask {
    /// Schedule `cfg` to come back on `tx` after `policy.timeout()`.
    ///
    /// The task runs on a child of `parent`, so cancelling the parent or this
    /// handle both stop it. `policy` is stored as given; callers pass the
    /// already spent policy.
    pub fn spawn(
        parent: &CancellationToken,
        cfg: Config,
        policy: AutoDetect,
        tx: mpsc::Sender<RetryMsg>,
    ) -> Self {
        let token = parent.child_token();
        let timeout = policy.timeout();
        let task_token = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => return,
                _ = tokio::time::sleep(timeout) => {}
            }
            let msg = RetryMsg { cfg, token: task_token.clone() };
            tokio::select! {
                _ = task_token.cancelled() => {}
                _ = tx.send(msg) => {}
            }
        });
        Self { token, policy }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Pending retries keyed by config hash.
#[derive(Debug, Default)]
pub struct RetryCache {
    tasks: HashMap<ConfigHash, RetryTask>,
}

impl RetryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `task`, cancelling any task it replaces.
    pub fn put(&mut self, hash: ConfigHash, task: RetryTask) {
        if let Some(old) = self.tasks.insert(hash, task) {
            old.cancel();
        }
    }

    /// Remove and return the task for `hash` without cancelling it.
    pub fn take(&mut self, hash: ConfigHash) -> Option<RetryTask> {
        self.tasks.remove(&hash)
    }

    /// Cancel and forget the task for `hash`. True if one existed.
    pub fn cancel(&mut self, hash: ConfigHash) -> bool {
        match self.tasks.remove(&hash) {
            Some(task) => {
                task.cancel();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, hash: ConfigHash) -> bool {
        self.tasks.contains_key(&hash)
    }

    pub fn cancel_all(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.cancel();
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
