// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::discoverer::{send_groups, Discoverer};
use crate::file::{expand, read_file, ModuleDefaults};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use wd_core::{provider, Group};

/// Reads the files matching a set of glob patterns once.
pub struct FileReader {
    patterns: Vec<String>,
    defaults: ModuleDefaults,
}

impl FileReader {
    pub fn new(patterns: Vec<String>, defaults: ModuleDefaults) -> Self {
        Self { patterns, defaults }
    }

    /// One group per readable file. Unreadable or invalid files are skipped.
    pub fn read(&self) -> Vec<Group> {
        let files = match expand(&self.patterns) {
            Ok(files) => files,
            Err(e) => {
                warn!(error = %e, "cannot expand config patterns");
                return Vec::new();
            }
        };
        files
            .into_iter()
            .filter_map(|path| match read_file(&path, &self.defaults, provider::FILE_READER) {
                Ok(configs) => Some(Group::new(path.display().to_string(), configs)),
                Err(e) => {
                    warn!(error = %e, "skipping job file");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl Discoverer for FileReader {
    fn name(&self) -> &str {
        provider::FILE_READER
    }

    async fn discover(&self, cancel: CancellationToken, out: mpsc::Sender<Vec<Group>>) {
        let groups = self.read();
        debug!(files = groups.len(), "read job files");
        if !groups.is_empty() {
            send_groups(&cancel, &out, groups).await;
        }
    }
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
