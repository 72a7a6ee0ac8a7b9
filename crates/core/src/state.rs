// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job classification states and the persistence contracts around them.

use crate::config::Config;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of the most recent attempt to bring a config up.
///
/// Exactly one state is current per config; a new classification overwrites
/// the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Detected, registered and started
    Success,
    /// Detection failed, a resubmission is scheduled
    Retry,
    /// Detection failed and the retry budget is spent
    Failed,
    /// Another config with the same full name runs in this process
    DuplicateLocal,
    /// Another process holds the full name
    DuplicateGlobal,
    /// Registration failed on resource exhaustion
    RegistrationError,
    /// Unknown module, bad config or unresolved vnode
    BuildError,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Success => "success",
            JobState::Retry => "retry",
            JobState::Failed => "failed",
            JobState::DuplicateLocal => "duplicate_local",
            JobState::DuplicateGlobal => "duplicate_global",
            JobState::RegistrationError => "registration_error",
            JobState::BuildError => "build_error",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records the latest classification of a config.
pub trait StateSaver: Send + Sync + 'static {
    fn save(&self, cfg: &Config, state: JobState);
    fn remove(&self, cfg: &Config);
}

/// Read access to classifications recorded by a previous run.
pub trait StateReader: Send + Sync + 'static {
    /// True if the recorded state of `cfg` is any of `states`.
    fn contains(&self, cfg: &Config, states: &[JobState]) -> bool;
}

/// Records nothing and remembers nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopState;

impl StateSaver for NoopState {
    fn save(&self, _cfg: &Config, _state: JobState) {}
    fn remove(&self, _cfg: &Config) {}
}

impl StateReader for NoopState {
    fn contains(&self, _cfg: &Config, _states: &[JobState]) -> bool {
        false
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
