// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File watcher: follows job files as they appear, change and disappear.
//!
//! Filesystem events only trigger a rescan; the rescan itself decides what
//! changed. A periodic rescan covers events the platform dropped and
//! directories that did not exist when watching started.

use crate::discoverer::{send_groups, Discoverer};
use crate::file::{expand, read_file, ModuleDefaults};
use async_trait::async_trait;
use notify::{Event as NotifyEvent, EventKind, RecursiveMode, Watcher};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wd_core::{provider, Config, Group};

/// Default interval between full rescans
pub const RESCAN_EVERY: Duration = Duration::from_secs(60);

pub struct FileWatcher {
    patterns: Vec<String>,
    defaults: ModuleDefaults,
    rescan_every: Duration,
}

impl FileWatcher {
    pub fn new(patterns: Vec<String>, defaults: ModuleDefaults) -> Self {
        Self { patterns, defaults, rescan_every: RESCAN_EVERY }
    }

    pub fn with_rescan_every(mut self, every: Duration) -> Self {
        self.rescan_every = every;
        self
    }

    /// Existing directories that may hold files matching the patterns.
    fn watch_dirs(&self) -> BTreeSet<PathBuf> {
        self.patterns.iter().filter_map(|p| static_prefix(p)).filter(|d| d.is_dir()).collect()
    }
}

/// Longest leading directory of `pattern` free of glob metacharacters.
fn static_prefix(pattern: &str) -> Option<PathBuf> {
    let mut dir = Path::new(pattern).parent()?;
    while dir.to_str().is_some_and(|s| s.contains(['*', '?', '['])) {
        dir = dir.parent()?;
    }
    Some(if dir.as_os_str().is_empty() { PathBuf::from(".") } else { dir.to_path_buf() })
}

/// Last configs seen per file
#[derive(Default)]
struct Seen {
    files: HashMap<PathBuf, Vec<Config>>,
}

impl Seen {
    /// Groups for files that are new, changed or gone since the last scan.
    fn rescan(&mut self, patterns: &[String], defaults: &ModuleDefaults) -> Vec<Group> {
        let files = match expand(patterns) {
            Ok(files) => files,
            Err(e) => {
                warn!(error = %e, "cannot expand config patterns");
                return Vec::new();
            }
        };

        let mut groups = Vec::new();
        let mut present = BTreeSet::new();
        for path in files {
            match read_file(&path, defaults, provider::FILE_WATCHER) {
                Ok(configs) => {
                    present.insert(path.clone());
                    if self.files.get(&path) != Some(&configs) {
                        debug!(path = %path.display(), jobs = configs.len(), "job file changed");
                        groups.push(Group::new(path.display().to_string(), configs.clone()));
                        self.files.insert(path, configs);
                    }
                }
                Err(e) => warn!(error = %e, "ignoring job file"),
            }
        }

        let gone: Vec<PathBuf> =
            self.files.keys().filter(|p| !present.contains(*p)).cloned().collect();
        for path in gone {
            info!(path = %path.display(), "job file withdrawn");
            self.files.remove(&path);
            groups.push(Group::empty(path.display().to_string()));
        }
        groups
    }
}

#[async_trait]
impl Discoverer for FileWatcher {
    fn name(&self) -> &str {
        provider::FILE_WATCHER
    }

    async fn discover(&self, cancel: CancellationToken, out: mpsc::Sender<Vec<Group>>) {
        let (event_tx, mut event_rx) = mpsc::channel(1);
        let watcher = notify::recommended_watcher(move |res: Result<NotifyEvent, _>| {
            if let Ok(event) = res {
                if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)) {
                    // A pending signal already covers this event.
                    let _ = event_tx.try_send(());
                }
            }
        });
        let _watcher = match watcher {
            Ok(mut watcher) => {
                for dir in self.watch_dirs() {
                    if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
                        warn!(dir = %dir.display(), error = %e, "cannot watch directory");
                    }
                }
                Some(watcher)
            }
            Err(e) => {
                warn!(error = %e, "file events unavailable, relying on rescans");
                None
            }
        };

        let mut seen = Seen::default();
        let mut ticker = tokio::time::interval(self.rescan_every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            let groups = seen.rescan(&self.patterns, &self.defaults);
            if !groups.is_empty() && !send_groups(&cancel, &out, groups).await {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
                Some(()) = event_rx.recv() => {}
            }
        }
        debug!("file watcher stopped");
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
