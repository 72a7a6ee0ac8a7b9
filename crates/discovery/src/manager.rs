// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Discovery manager: merges every discoverer's updates into coalesced
//! batches for the build manager.
//!
//! Discoverers write into one merge cache that keeps only the latest group per
//! source. The first batch is forwarded as soon as anything arrives; after
//! that the cache is flushed at most once per [`SEND_EVERY`], and only when
//! downstream has room. A slow consumer therefore sees fewer, larger batches
//! rather than a backlog.

use crate::discoverer::Discoverer;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wd_core::Group;

/// Interval between batch forwards after the first one
pub const SEND_EVERY: Duration = Duration::from_secs(2);

/// Latest group per source, waiting to be forwarded.
#[derive(Debug, Default)]
struct MergeCache {
    groups: BTreeMap<String, Group>,
}

impl MergeCache {
    fn update(&mut self, groups: Vec<Group>) {
        for group in groups {
            self.groups.insert(group.source.clone(), group);
        }
    }

    fn take(&mut self) -> Vec<Group> {
        std::mem::take(&mut self.groups).into_values().collect()
    }

    /// Put back a batch that could not be sent. Groups that arrived since the
    /// batch was taken are newer and win.
    fn restore(&mut self, groups: Vec<Group>) {
        for group in groups {
            self.groups.entry(group.source.clone()).or_insert(group);
        }
    }

    fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

pub struct DiscoveryManager {
    discoverers: Vec<Arc<dyn Discoverer>>,
    send_every: Duration,
}

impl Default for DiscoveryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryManager {
    pub fn new() -> Self {
        Self { discoverers: Vec::new(), send_every: SEND_EVERY }
    }

    pub fn with_discoverer(mut self, discoverer: Arc<dyn Discoverer>) -> Self {
        self.discoverers.push(discoverer);
        self
    }

    pub fn with_send_every(mut self, every: Duration) -> Self {
        self.send_every = every;
        self
    }

    pub fn len(&self) -> usize {
        self.discoverers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.discoverers.is_empty()
    }

    /// Run every discoverer and forward merged batches on `out` until
    /// `cancel` fires or `out` is closed.
    pub async fn run(self, cancel: CancellationToken, out: mpsc::Sender<Vec<Group>>) {
        // Stops the discoverers when downstream goes away on its own.
        let local = cancel.child_token();
        let cache = Arc::new(Mutex::new(MergeCache::default()));
        let (pending_tx, mut pending_rx) = mpsc::channel::<()>(1);

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();
        for discoverer in &self.discoverers {
            info!(discoverer = discoverer.name(), "starting discoverer");
            tasks.extend(spawn_discoverer(
                Arc::clone(discoverer),
                local.clone(),
                Arc::clone(&cache),
                pending_tx.clone(),
            ));
        }

        // First flush: forward as soon as anything arrives.
        tokio::select! {
            _ = local.cancelled() => {}
            Some(()) = pending_rx.recv() => {
                let batch = cache.lock().take();
                debug!(groups = batch.len(), "first flush");
                tokio::select! {
                    _ = local.cancelled() => {}
                    res = out.send(batch) => if res.is_err() {
                        warn!("downstream closed, stopping discovery");
                        local.cancel();
                    },
                }
            }
        }

        let mut ticker = tokio::time::interval(self.send_every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        while !local.is_cancelled() {
            tokio::select! {
                _ = local.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if pending_rx.try_recv().is_err() {
                continue;
            }
            let batch = cache.lock().take();
            if batch.is_empty() {
                continue;
            }
            match out.try_send(batch) {
                Ok(()) => {}
                Err(TrySendError::Full(batch)) => {
                    debug!(groups = batch.len(), "downstream busy, holding batch");
                    cache.lock().restore(batch);
                    let _ = pending_tx.try_send(());
                }
                Err(TrySendError::Closed(_)) => {
                    warn!("downstream closed, stopping discovery");
                    local.cancel();
                }
            }
        }

        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "discovery task ended abnormally");
            }
        }
        debug!(pending = !cache.lock().is_empty(), "discovery manager stopped");
    }
}

/// Run one discoverer plus a task moving its output into the merge cache.
fn spawn_discoverer(
    discoverer: Arc<dyn Discoverer>,
    cancel: CancellationToken,
    cache: Arc<Mutex<MergeCache>>,
    pending: mpsc::Sender<()>,
) -> [JoinHandle<()>; 2] {
    let (tx, mut rx) = mpsc::channel::<Vec<Group>>(1);

    let run = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            discoverer.discover(cancel, tx).await;
            debug!(discoverer = discoverer.name(), "discoverer finished");
        }
    });

    let merge = tokio::spawn(async move {
        loop {
            let groups = tokio::select! {
                _ = cancel.cancelled() => return,
                groups = rx.recv() => match groups {
                    Some(groups) => groups,
                    None => return,
                },
            };
            cache.lock().update(groups);
            // Full means a signal is already pending.
            let _ = pending.try_send(());
        }
    });

    [run, merge]
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
