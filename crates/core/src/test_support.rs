// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::config::{Config, KEY_MODULE, KEY_NAME};
use crate::state::{JobState, StateReader, StateSaver};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Config with just `module` and `name` set.
pub fn config(module: &str, name: &str) -> Config {
    Config::new().with(KEY_MODULE, module).with(KEY_NAME, name)
}

// ── Proptest strategies ─────────────────────────────────────────────────

pub mod strategies {
    use super::config;
    use crate::config::Config;
    use proptest::prelude::*;

    /// Configs drawn from a small name space so that collisions are common.
    pub fn arb_config() -> impl Strategy<Value = Config> {
        (0u8..3, 0u8..4).prop_map(|(m, n)| config(&format!("m{m}"), &format!("n{n}")))
    }
}

// ── State fakes ─────────────────────────────────────────────────────────

/// A single recorded `save`/`remove` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateCall {
    Save { full_name: String, state: JobState },
    Remove { full_name: String },
}

/// `StateSaver` that records every call in order.
#[derive(Clone, Default)]
pub struct RecordingStateSaver {
    calls: Arc<Mutex<Vec<StateCall>>>,
}

impl RecordingStateSaver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<StateCall> {
        self.calls.lock().clone()
    }

    /// States saved for `full_name`, in order.
    pub fn states_of(&self, full_name: &str) -> Vec<JobState> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                StateCall::Save { full_name: n, state } if n == full_name => Some(*state),
                _ => None,
            })
            .collect()
    }
}

impl StateSaver for RecordingStateSaver {
    fn save(&self, cfg: &Config, state: JobState) {
        self.calls.lock().push(StateCall::Save { full_name: cfg.full_name(), state });
    }

    fn remove(&self, cfg: &Config) {
        self.calls.lock().push(StateCall::Remove { full_name: cfg.full_name() });
    }
}

/// `StateReader` backed by a fixed full-name → state table.
#[derive(Clone, Default)]
pub struct FixedStateReader {
    states: HashMap<String, JobState>,
}

impl FixedStateReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, full_name: &str, state: JobState) -> Self {
        self.states.insert(full_name.to_string(), state);
        self
    }
}

impl StateReader for FixedStateReader {
    fn contains(&self, cfg: &Config, states: &[JobState]) -> bool {
        self.states.get(&cfg.full_name()).is_some_and(|s| states.contains(s))
    }
}
