// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run manager: owns started jobs and drives them on a one-second clock.
//!
//! Start, stop and the tick broadcast all take the same lock, so a job is
//! never ticked before it is in the list or after it has been removed.

use crate::job::Job;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default interval between clock ticks
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Starts and stops jobs on behalf of the build manager.
#[async_trait]
pub trait Runner: Send + Sync + 'static {
    fn start(&self, job: Arc<dyn Job>);

    /// Stop every started job named `full_name` and wait for it to finish.
    async fn stop(&self, full_name: &str);
}

struct Started {
    job: Arc<dyn Job>,
    task: JoinHandle<()>,
}

pub struct RunManager {
    jobs: Mutex<Vec<Started>>,
    tick_interval: Duration,
}

impl Default for RunManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RunManager {
    pub fn new() -> Self {
        Self { jobs: Mutex::new(Vec::new()), tick_interval: TICK_INTERVAL }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Full names of started jobs, in start order.
    pub fn running(&self) -> Vec<String> {
        self.jobs.lock().iter().map(|s| s.job.full_name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Tick loop. The clock starts at the current unix second and advances
    /// by one per tick, so it never goes backwards.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut clock = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    clock += 1;
                    self.notify(clock);
                }
            }
        }
        debug!("run manager stopped ticking");
    }

    fn notify(&self, clock: u64) {
        for started in self.jobs.lock().iter() {
            started.job.tick(clock);
        }
    }

    /// Stop every started job. Used at shutdown.
    pub async fn cleanup(&self) {
        let drained: Vec<Started> = std::mem::take(&mut *self.jobs.lock());
        if !drained.is_empty() {
            info!(jobs = drained.len(), "stopping all jobs");
        }
        for started in drained {
            finish(started).await;
        }
    }
}

async fn finish(started: Started) {
    started.job.stop();
    if let Err(e) = started.task.await {
        warn!(full_name = %started.job.full_name(), error = %e, "job task ended abnormally");
    }
}

#[async_trait]
impl Runner for RunManager {
    fn start(&self, job: Arc<dyn Job>) {
        let task = tokio::spawn({
            let job = Arc::clone(&job);
            async move { job.start().await }
        });
        info!(full_name = %job.full_name(), "started job");
        self.jobs.lock().push(Started { job, task });
    }

    async fn stop(&self, full_name: &str) {
        let stopping: Vec<Started> = {
            let mut jobs = self.jobs.lock();
            let (stopping, kept): (Vec<Started>, Vec<Started>) =
                std::mem::take(&mut *jobs).into_iter().partition(|s| s.job.full_name() == full_name);
            *jobs = kept;
            stopping
        };
        for started in stopping {
            finish(started).await;
            info!(full_name, "stopped job");
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
