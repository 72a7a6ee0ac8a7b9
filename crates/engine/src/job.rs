// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job contract and the module-driven job harness.
//!
//! A [`Job`] is built by the build manager, probed once, and handed to a
//! runner which spawns [`Job::start`] and feeds it [`Job::tick`]s. The runner
//! ends it with [`Job::stop`] and awaits the start task.

use crate::module::{Metrics, Module};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use wd_adapters::Vnode;

#[async_trait]
pub trait Job: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn module_name(&self) -> &str;
    fn full_name(&self) -> &str;

    /// Seconds between auto-detection retries as configured; 0 when unset.
    fn auto_detection_every(&self) -> u64;

    /// Configured retry budget, `None` when unlimited.
    fn auto_detection_tries(&self) -> Option<u32>;

    /// Probe the target. May block; callers run it off the async threads.
    fn auto_detection(&self) -> bool;

    /// Clock notification. Must not block; a busy job may drop ticks.
    fn tick(&self, clock: u64);

    /// Collection loop. Returns once [`Job::stop`] is called.
    async fn start(&self);

    fn stop(&self);

    /// Release resources of a job that will never be started.
    fn cleanup(&self);
}

/// Identity and scheduling metadata of a built job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobInfo {
    pub name: String,
    pub module: String,
    /// Identity used for dedup, locally and across processes
    pub full_name: String,
    /// Seconds between collections, at least 1
    pub update_every: u64,
    /// Ordering hint for the metrics consumer
    pub priority: i64,
    pub labels: BTreeMap<String, String>,
    /// Virtual node the metrics are attributed to
    pub vnode: Option<Vnode>,
}

/// Receives collected metrics. Stands in for the wire writer.
pub trait MetricsSink: Send + Sync + 'static {
    fn write(&self, job: &JobInfo, clock: u64, metrics: &Metrics);
}

/// Sink that logs each collection at debug level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl MetricsSink for LogSink {
    fn write(&self, job: &JobInfo, clock: u64, metrics: &Metrics) {
        debug!(full_name = %job.full_name, clock, metrics = metrics.len(), "collected");
    }
}

/// [`Job`] driving a collector [`Module`] on the clock.
pub struct ModuleJob {
    info: JobInfo,
    autodetect_every: u64,
    autodetect_tries: Option<u32>,
    module: Arc<Mutex<Box<dyn Module>>>,
    sink: Arc<dyn MetricsSink>,
    tick_tx: mpsc::Sender<u64>,
    tick_rx: Mutex<Option<mpsc::Receiver<u64>>>,
    stop: CancellationToken,
}

impl ModuleJob {
    /// Wrap `module`. Collected metrics go to `sink`; detection settings are
    /// reported as given.
    pub fn new(
        info: JobInfo,
        autodetect_every: u64,
        autodetect_tries: Option<u32>,
        module: Box<dyn Module>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        let (tick_tx, tick_rx) = mpsc::channel(1);
        Self {
            info,
            autodetect_every,
            autodetect_tries,
            module: Arc::new(Mutex::new(module)),
            sink,
            tick_tx,
            tick_rx: Mutex::new(Some(tick_rx)),
            stop: CancellationToken::new(),
        }
    }

    pub fn info(&self) -> &JobInfo {
        &self.info
    }

    async fn collect(&self, clock: u64) {
        let module = Arc::clone(&self.module);
        let result = tokio::task::spawn_blocking(move || module.lock().collect()).await;
        match result {
            Ok(Ok(metrics)) => self.sink.write(&self.info, clock, &metrics),
            Ok(Err(e)) => warn!(full_name = %self.info.full_name, error = %e, "collection failed"),
            Err(e) => warn!(full_name = %self.info.full_name, error = %e, "collection panicked"),
        }
    }
}

#[async_trait]
impl Job for ModuleJob {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn module_name(&self) -> &str {
        &self.info.module
    }

    fn full_name(&self) -> &str {
        &self.info.full_name
    }

    fn auto_detection_every(&self) -> u64 {
        self.autodetect_every
    }

    fn auto_detection_tries(&self) -> Option<u32> {
        self.autodetect_tries
    }

    fn auto_detection(&self) -> bool {
        match self.module.lock().check() {
            Ok(()) => true,
            Err(e) => {
                warn!(full_name = %self.info.full_name, error = %e, "auto-detection failed");
                false
            }
        }
    }

    fn tick(&self, clock: u64) {
        if self.tick_tx.try_send(clock).is_err() {
            debug!(full_name = %self.info.full_name, clock, "skipping tick, previous run in progress");
        }
    }

    async fn start(&self) {
        let ticks = self.tick_rx.lock().take();
        let Some(mut ticks) = ticks else {
            warn!(full_name = %self.info.full_name, "job started twice");
            return;
        };
        let every = self.info.update_every.max(1);
        debug!(full_name = %self.info.full_name, every, "job started");

        loop {
            tokio::select! {
                _ = self.stop.cancelled() => break,
                clock = ticks.recv() => match clock {
                    Some(clock) if clock % every == 0 => self.collect(clock).await,
                    Some(_) => {}
                    None => break,
                },
            }
        }

        self.cleanup();
        debug!(full_name = %self.info.full_name, "job stopped");
    }

    fn stop(&self) {
        self.stop.cancel();
    }

    fn cleanup(&self) {
        self.module.lock().cleanup();
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
