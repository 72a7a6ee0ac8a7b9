// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake jobs, factories and runners for tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::factory::{BuildError, JobFactory};
use crate::job::Job;
use crate::run::Runner;
use async_trait::async_trait;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use wd_core::Config;

/// Blocks detection until opened.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    opened: Condvar,
}

impl Gate {
    pub fn open(&self) {
        *self.open.lock() = true;
        self.opened.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.opened.wait(&mut open);
        }
    }
}

/// Job with scripted detection that records every lifecycle call.
pub struct FakeJob {
    name: String,
    module: String,
    full_name: String,
    every: u64,
    tries: Option<u32>,
    detect: bool,
    gate: Option<Arc<Gate>>,
    detections: AtomicUsize,
    cleanups: AtomicUsize,
    ticks: Mutex<Vec<u64>>,
    stop: CancellationToken,
}

impl FakeJob {
    pub fn from_config(cfg: &Config, detect: bool) -> Self {
        Self {
            name: cfg.name().to_string(),
            module: cfg.module().to_string(),
            full_name: cfg.full_name(),
            every: cfg.autodetection_retry(),
            tries: cfg.autodetection_tries(),
            detect,
            gate: None,
            detections: AtomicUsize::new(0),
            cleanups: AtomicUsize::new(0),
            ticks: Mutex::new(Vec::new()),
            stop: CancellationToken::new(),
        }
    }

    /// Make detection wait for `gate` to open.
    pub fn with_gate(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn detections(&self) -> usize {
        self.detections.load(Ordering::SeqCst)
    }

    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }

    pub fn ticks(&self) -> Vec<u64> {
        self.ticks.lock().clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}

#[async_trait]
impl Job for FakeJob {
    fn name(&self) -> &str {
        &self.name
    }

    fn module_name(&self) -> &str {
        &self.module
    }

    fn full_name(&self) -> &str {
        &self.full_name
    }

    fn auto_detection_every(&self) -> u64 {
        self.every
    }

    fn auto_detection_tries(&self) -> Option<u32> {
        self.tries
    }

    fn auto_detection(&self) -> bool {
        self.detections.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        self.detect
    }

    fn tick(&self, clock: u64) {
        self.ticks.lock().push(clock);
    }

    async fn start(&self) {
        self.stop.cancelled().await;
    }

    fn stop(&self) {
        self.stop.cancel();
    }

    fn cleanup(&self) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FakeFactoryState {
    failing: HashSet<String>,
    unknown: HashSet<String>,
    gates: HashMap<String, Arc<Gate>>,
    built: Vec<Arc<FakeJob>>,
}

/// Factory building [`FakeJob`]s. Detection succeeds unless the module was
/// marked failing.
#[derive(Clone, Default)]
pub struct FakeJobFactory {
    inner: Arc<Mutex<FakeFactoryState>>,
}

impl FakeJobFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_detection(&self, module: &str) {
        self.inner.lock().failing.insert(module.to_string());
    }

    pub fn pass_detection(&self, module: &str) {
        self.inner.lock().failing.remove(module);
    }

    /// Hold detection of `module` jobs until [`FakeJobFactory::release_detection`].
    pub fn hold_detection(&self, module: &str) {
        self.inner.lock().gates.insert(module.to_string(), Arc::new(Gate::default()));
    }

    pub fn release_detection(&self, module: &str) {
        if let Some(gate) = self.inner.lock().gates.remove(module) {
            gate.open();
        }
    }

    pub fn unknown_module(&self, module: &str) {
        self.inner.lock().unknown.insert(module.to_string());
    }

    pub fn built(&self) -> Vec<Arc<FakeJob>> {
        self.inner.lock().built.clone()
    }

    pub fn built_for(&self, full_name: &str) -> Vec<Arc<FakeJob>> {
        self.inner.lock().built.iter().filter(|j| j.full_name == full_name).cloned().collect()
    }
}

impl JobFactory for FakeJobFactory {
    fn build(&self, cfg: &Config) -> Result<Arc<dyn Job>, BuildError> {
        let mut inner = self.inner.lock();
        if inner.unknown.contains(cfg.module()) {
            return Err(BuildError::UnknownModule(cfg.module().to_string()));
        }
        let mut job = FakeJob::from_config(cfg, !inner.failing.contains(cfg.module()));
        if let Some(gate) = inner.gates.get(cfg.module()) {
            job = job.with_gate(Arc::clone(gate));
        }
        let job = Arc::new(job);
        inner.built.push(Arc::clone(&job));
        Ok(job)
    }
}

/// Recorded runner call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerCall {
    Start(String),
    Stop(String),
}

#[derive(Default)]
struct FakeRunnerState {
    calls: Vec<RunnerCall>,
    running: Vec<Arc<dyn Job>>,
    stop_gate: Option<watch::Sender<bool>>,
}

/// Runner that records calls without spawning anything.
#[derive(Clone, Default)]
pub struct FakeRunner {
    inner: Arc<Mutex<FakeRunnerState>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RunnerCall> {
        self.inner.lock().calls.clone()
    }

    /// Make every `stop` wait until [`FakeRunner::release_stops`].
    pub fn hold_stops(&self) {
        self.inner.lock().stop_gate = Some(watch::channel(false).0);
    }

    pub fn release_stops(&self) {
        if let Some(gate) = &self.inner.lock().stop_gate {
            gate.send_replace(true);
        }
    }

    pub fn running(&self) -> Vec<String> {
        self.inner.lock().running.iter().map(|j| j.full_name().to_string()).collect()
    }
}

#[async_trait]
impl Runner for FakeRunner {
    fn start(&self, job: Arc<dyn Job>) {
        let mut inner = self.inner.lock();
        inner.calls.push(RunnerCall::Start(job.full_name().to_string()));
        inner.running.push(job);
    }

    async fn stop(&self, full_name: &str) {
        let gate = {
            let mut inner = self.inner.lock();
            inner.calls.push(RunnerCall::Stop(full_name.to_string()));
            inner.stop_gate.as_ref().map(watch::Sender::subscribe)
        };
        if let Some(mut gate) = gate {
            let _ = gate.wait_for(|open| *open).await;
        }

        let mut inner = self.inner.lock();
        inner.running.retain(|j| {
            if j.full_name() == full_name {
                j.stop();
                false
            } else {
                true
            }
        });
    }
}
