// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Last-known job classifications, persisted for restart recovery.
//!
//! The on-disk format is a two-level JSON object, `{module: {job: state}}`,
//! rewritten in full on every flush. Writes are debounced: `save`/`remove`
//! only mark the map dirty, and the flush loop writes it out at most once per
//! flush interval plus once more on shutdown.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wd_core::{Config, JobState, StateReader, StateSaver};

/// Default interval between flushes of a dirty state map
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

type StateMap = BTreeMap<String, BTreeMap<String, JobState>>;

/// Errors from reading or writing the state file
#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Classifications recorded by a previous run, read once at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistedStates(StateMap);

impl PersistedStates {
    /// Read the state file. A missing file yields an empty set.
    pub fn load(path: &Path) -> Result<Self, StateError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Like [`PersistedStates::load`], but a corrupt or unreadable file is
    /// logged and treated as empty so recovery heuristics fall back to defaults.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(states) => {
                info!(path = %path.display(), jobs = states.len(), "loaded previous job states");
                states
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable state file");
                Self::default()
            }
        }
    }

    pub fn lookup(&self, cfg: &Config) -> Option<JobState> {
        self.0.get(cfg.module())?.get(cfg.name()).copied()
    }

    /// Number of recorded jobs across all modules
    pub fn len(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StateReader for PersistedStates {
    fn contains(&self, cfg: &Config, states: &[JobState]) -> bool {
        self.lookup(cfg).is_some_and(|s| states.contains(&s))
    }
}

/// Live classification map with debounced disk flushes.
pub struct StateManager {
    path: PathBuf,
    flush_interval: Duration,
    states: Mutex<StateMap>,
    dirty: AtomicBool,
}

impl StateManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            states: Mutex::new(StateMap::new()),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state of `cfg`, if recorded.
    pub fn lookup(&self, cfg: &Config) -> Option<JobState> {
        self.states.lock().get(cfg.module())?.get(cfg.name()).copied()
    }

    /// Flush loop. Drains the dirty flag on every tick and flushes once more
    /// when `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if self.dirty.swap(false, Ordering::AcqRel) {
                        self.flush_logged();
                    }
                }
            }
        }

        self.dirty.store(false, Ordering::Release);
        self.flush_logged();
    }

    fn flush_logged(&self) {
        if let Err(e) = self.flush() {
            warn!(path = %self.path.display(), error = %e, "failed to flush job states");
        }
    }

    /// Write the whole map to disk, replacing the previous file.
    pub fn flush(&self) -> Result<(), StateError> {
        let json = {
            let states = self.states.lock();
            serde_json::to_string_pretty(&*states)?
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "flushed job states");
        Ok(())
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }
}

impl StateSaver for StateManager {
    fn save(&self, cfg: &Config, state: JobState) {
        let mut states = self.states.lock();
        let jobs = states.entry(cfg.module().to_string()).or_default();
        if jobs.get(cfg.name()) == Some(&state) {
            return;
        }
        jobs.insert(cfg.name().to_string(), state);
        self.mark_dirty();
    }

    fn remove(&self, cfg: &Config) {
        let mut states = self.states.lock();
        let Some(jobs) = states.get_mut(cfg.module()) else {
            return;
        };
        if jobs.remove(cfg.name()).is_none() {
            return;
        }
        if jobs.is_empty() {
            states.remove(cfg.module());
        }
        self.mark_dirty();
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
