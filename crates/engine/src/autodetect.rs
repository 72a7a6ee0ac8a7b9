// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auto-detection retry policy and restart-recovery overrides.

use crate::job::Job;
use std::time::Duration;
use wd_core::{provider, Config, JobState, StateReader};

/// Interval and remaining budget for auto-detection retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoDetect {
    /// Seconds between attempts; 0 disables retries
    pub every: u64,
    /// Remaining retries, `None` when unlimited
    pub tries: Option<u32>,
}

/// Jobs that were healthy before a restart get a longer grace period.
pub const RECOVER_PREVIOUSLY_HEALTHY: AutoDetect = AutoDetect { every: 30, tries: Some(11) };

/// Jobs discovered by a file watcher inside a cluster.
pub const RECOVER_CLUSTER_FILE_WATCHER: AutoDetect = AutoDetect { every: 10, tries: Some(7) };

impl AutoDetect {
    pub fn of(job: &dyn Job) -> Self {
        Self { every: job.auto_detection_every(), tries: job.auto_detection_tries() }
    }

    pub fn can_retry(&self) -> bool {
        self.every > 0 && self.tries.is_none_or(|t| t > 0)
    }

    /// Policy for the next attempt, with one retry spent.
    pub fn spend(&self) -> Self {
        Self { every: self.every, tries: self.tries.map(|t| t.saturating_sub(1)) }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.every)
    }
}

/// Policy for a fresh (non-resumed) attempt.
///
/// An explicit interval in the config always wins. Otherwise jobs recorded as
/// `success` or `retry` by the previous run, then file-watcher jobs inside a
/// cluster, get a recovery profile instead of giving up on the first failure.
pub fn initial_policy(
    cfg: &Config,
    job: &dyn Job,
    prev_state: &dyn StateReader,
    in_cluster: bool,
) -> AutoDetect {
    let own = AutoDetect::of(job);
    if own.every != 0 {
        return own;
    }
    if prev_state.contains(cfg, &[JobState::Success, JobState::Retry]) {
        return RECOVER_PREVIOUSLY_HEALTHY;
    }
    if in_cluster && cfg.provider() == provider::FILE_WATCHER {
        return RECOVER_CLUSTER_FILE_WATCHER;
    }
    own
}

/// True when both Kubernetes service variables are set.
pub fn is_inside_cluster() -> bool {
    let set = |key| std::env::var(key).is_ok_and(|v| !v.is_empty());
    set("KUBERNETES_SERVICE_HOST") && set("KUBERNETES_SERVICE_PORT")
}

#[cfg(test)]
#[path = "autodetect_tests.rs"]
mod tests;
