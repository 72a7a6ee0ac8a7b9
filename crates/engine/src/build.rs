// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build manager: turns config deltas into running jobs.
//!
//! Two tasks cooperate. The fan-in task owns the [`GroupCache`] and turns
//! discovery batches into ordered add/remove deltas. The dispatcher owns the
//! started-set and the retry cache and is the only task that classifies
//! configs, so neither needs a lock.
//!
//! Each config ends up in exactly one [`JobState`]:
//!
//! ```text
//! add ──▶ duplicate_local
//!    └──▶ build ──✗──▶ build_error
//!           └──▶ detect ──✗──▶ retry (resubmitted later) | failed
//!                  └──▶ register ──▶ success | duplicate_global | registration_error
//! ```

use crate::autodetect::{initial_policy, is_inside_cluster, AutoDetect};
use crate::factory::JobFactory;
use crate::group_cache::GroupCache;
use crate::job::Job;
use crate::retry::{RetryCache, RetryMsg, RetryTask};
use crate::run::Runner;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wd_adapters::{NoopRegistry, Registry};
use wd_core::{Config, ConfigHash, Group, JobState, NoopState, StateReader, StateSaver};

/// Ordered change to the global config set.
#[derive(Debug)]
enum Delta {
    Added(Vec<Config>),
    Removed(Vec<Config>),
}

pub struct BuildManager {
    factory: Arc<dyn JobFactory>,
    runner: Arc<dyn Runner>,
    registry: Arc<dyn Registry>,
    saver: Arc<dyn StateSaver>,
    prev_state: Arc<dyn StateReader>,
    in_cluster: bool,
}

impl BuildManager {
    pub fn new(factory: Arc<dyn JobFactory>, runner: Arc<dyn Runner>) -> Self {
        Self {
            factory,
            runner,
            registry: Arc::new(NoopRegistry),
            saver: Arc::new(NoopState),
            prev_state: Arc::new(NoopState),
            in_cluster: is_inside_cluster(),
        }
    }

    pub fn with_registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_saver(mut self, saver: Arc<dyn StateSaver>) -> Self {
        self.saver = saver;
        self
    }

    /// States recorded by the previous run, used for restart recovery.
    pub fn with_prev_state(mut self, prev_state: Arc<dyn StateReader>) -> Self {
        self.prev_state = prev_state;
        self
    }

    pub fn with_in_cluster(mut self, in_cluster: bool) -> Self {
        self.in_cluster = in_cluster;
        self
    }

    /// Consume group batches from `input` until `cancel` fires.
    ///
    /// A closed input stops the fan-in but pending retries keep being served
    /// until cancellation.
    pub async fn run(self, cancel: CancellationToken, input: mpsc::Receiver<Vec<Group>>) {
        let (delta_tx, mut delta_rx) = mpsc::channel(1);
        let (retry_tx, mut retry_rx) = mpsc::channel(1);

        let fan_in = tokio::spawn(fan_in(cancel.clone(), input, delta_tx));

        let mut dispatcher = Dispatcher {
            manager: self,
            cancel: cancel.clone(),
            retry_tx,
            started: HashMap::new(),
            retries: RetryCache::new(),
        };

        info!("build manager started");
        let mut deltas_open = true;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                delta = delta_rx.recv(), if deltas_open => match delta {
                    Some(Delta::Removed(cfgs)) => {
                        for cfg in cfgs {
                            dispatcher.remove(&cfg).await;
                        }
                    }
                    Some(Delta::Added(cfgs)) => {
                        for cfg in cfgs {
                            dispatcher.add(cfg, None).await;
                        }
                    }
                    None => {
                        debug!("config input closed");
                        deltas_open = false;
                    }
                },
                Some(msg) = retry_rx.recv() => dispatcher.resubmit(msg).await,
            }
        }

        dispatcher.retries.cancel_all();
        if let Err(e) = fan_in.await {
            warn!(error = %e, "fan-in task ended abnormally");
        }
        info!("build manager stopped");
    }
}

async fn fan_in(
    cancel: CancellationToken,
    mut input: mpsc::Receiver<Vec<Group>>,
    tx: mpsc::Sender<Delta>,
) {
    let mut cache = GroupCache::new();
    loop {
        let groups = tokio::select! {
            _ = cancel.cancelled() => return,
            groups = input.recv() => match groups {
                Some(groups) => groups,
                None => return,
            },
        };

        let mut added = Vec::new();
        let mut removed = Vec::new();
        for group in &groups {
            let (a, r) = cache.put(group);
            added.extend(a);
            removed.extend(r);
        }
        debug!(added = added.len(), removed = removed.len(), configs = cache.len(), "applied groups");

        for delta in [Delta::Removed(removed), Delta::Added(added)] {
            if matches!(&delta, Delta::Removed(v) | Delta::Added(v) if v.is_empty()) {
                continue;
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                res = tx.send(delta) => if res.is_err() { return },
            }
        }
    }
}

struct Dispatcher {
    manager: BuildManager,
    cancel: CancellationToken,
    retry_tx: mpsc::Sender<RetryMsg>,
    /// full name → hash of the config that owns it
    started: HashMap<String, ConfigHash>,
    retries: RetryCache,
}

impl Dispatcher {
    async fn resubmit(&mut self, msg: RetryMsg) {
        let hash = msg.cfg.hash();
        if msg.token.is_cancelled() {
            debug!(full_name = %msg.cfg.full_name(), "dropping stale retry");
            return;
        }
        let Some(task) = self.retries.take(hash) else {
            debug!(full_name = %msg.cfg.full_name(), "dropping orphaned retry");
            return;
        };
        if task.is_cancelled() {
            return;
        }
        self.add(msg.cfg, Some(task.policy)).await;
    }

    async fn add(&mut self, cfg: Config, resumed: Option<AutoDetect>) {
        let full_name = cfg.full_name();
        let hash = cfg.hash();

        if self.started.contains_key(&full_name) {
            info!(full_name, "job with the same name is already running");
            self.save(&cfg, JobState::DuplicateLocal);
            return;
        }

        let job = match self.manager.factory.build(&cfg) {
            Ok(job) => job,
            Err(e) => {
                warn!(full_name, error = %e, "cannot build job");
                self.save(&cfg, JobState::BuildError);
                return;
            }
        };

        let policy = resumed.unwrap_or_else(|| {
            initial_policy(&cfg, job.as_ref(), self.manager.prev_state.as_ref(), self.manager.in_cluster)
        });

        let Some(detected) = self.detect(&job).await else {
            // Detection may still hold the job; clean up once it lets go.
            tokio::task::spawn_blocking(move || job.cleanup());
            return;
        };

        if !detected {
            job.cleanup();
            if policy.can_retry() {
                info!(full_name, every = policy.every, tries = ?policy.tries, "detection failed, will retry");
                self.save(&cfg, JobState::Retry);
                let task = RetryTask::spawn(&self.cancel, cfg, policy.spend(), self.retry_tx.clone());
                self.retries.put(hash, task);
            } else {
                info!(full_name, "detection failed");
                self.save(&cfg, JobState::Failed);
            }
            return;
        }

        match self.manager.registry.register(&full_name) {
            Ok(true) => {}
            Ok(false) => {
                info!(full_name, "already collected by another process");
                job.cleanup();
                self.save(&cfg, JobState::DuplicateGlobal);
                return;
            }
            Err(e) if e.is_resource_exhausted() => {
                warn!(full_name, error = %e, "cannot register job");
                job.cleanup();
                self.save(&cfg, JobState::RegistrationError);
                return;
            }
            Err(e) => {
                warn!(full_name, error = %e, "registration denied");
                job.cleanup();
                self.save(&cfg, JobState::DuplicateGlobal);
                return;
            }
        }

        self.save(&cfg, JobState::Success);
        self.manager.runner.start(job);
        self.started.insert(full_name, hash);
    }

    /// Run detection on the blocking pool. `None` when cancelled.
    async fn detect(&self, job: &Arc<dyn Job>) -> Option<bool> {
        let handle = tokio::task::spawn_blocking({
            let job = Arc::clone(job);
            move || job.auto_detection()
        });
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            res = handle => Some(res.unwrap_or_else(|e| {
                warn!(full_name = %job.full_name(), error = %e, "detection panicked");
                false
            })),
        }
    }

    async fn remove(&mut self, cfg: &Config) {
        let full_name = cfg.full_name();
        let hash = cfg.hash();

        if self.retries.cancel(hash) {
            debug!(full_name, "cancelled pending retry");
        }

        if self.started.get(&full_name) == Some(&hash) {
            self.started.remove(&full_name);
            self.manager.runner.stop(&full_name).await;
            if let Err(e) = self.manager.registry.unregister(&full_name) {
                warn!(full_name, error = %e, "cannot unregister job");
            }
        }

        self.manager.saver.remove(cfg);
    }

    fn save(&self, cfg: &Config, state: JobState) {
        debug!(full_name = %cfg.full_name(), %state, "classified");
        self.manager.saver.save(cfg, state);
    }
}

#[cfg(test)]
#[path = "build_tests.rs"]
mod tests;
