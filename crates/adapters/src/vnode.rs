// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Virtual node registry.
//!
//! A vnode lets a job report its metrics as if they came from another host.
//! Definitions live in TOML files and are loaded once at startup:
//!
//! ```toml
//! [[vnode]]
//! name = "db-primary"
//! guid = "6f0c5e4a-..."
//! hostname = "db1.example"
//! labels = { role = "primary" }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from loading vnode definitions
#[derive(Debug, Error)]
pub enum VnodeError {
    #[error("IO error reading {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("invalid vnode file {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vnode {
    pub name: String,
    pub guid: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct VnodeFile {
    #[serde(default)]
    vnode: Vec<Vnode>,
}

/// Static name → vnode table.
#[derive(Debug, Clone, Default)]
pub struct VnodeRegistry {
    nodes: HashMap<String, Vnode>,
}

impl VnodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.toml` file in `dir`. A missing directory yields an empty
    /// registry; invalid files and entries are logged and skipped.
    pub fn load_dir(dir: &Path) -> Result<Self, VnodeError> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(VnodeError::Io(dir.to_path_buf(), e)),
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        let mut registry = Self::new();
        for path in paths {
            match Self::read_file(&path) {
                Ok(nodes) => registry.extend(nodes),
                Err(e) => warn!(error = %e, "skipping vnode file"),
            }
        }
        debug!(dir = %dir.display(), count = registry.len(), "loaded vnodes");
        Ok(registry)
    }

    fn read_file(path: &Path) -> Result<Vec<Vnode>, VnodeError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| VnodeError::Io(path.to_path_buf(), e))?;
        let file: VnodeFile =
            toml::from_str(&text).map_err(|e| VnodeError::Parse(path.to_path_buf(), e))?;
        Ok(file.vnode)
    }

    /// Add vnodes; later definitions of a name replace earlier ones.
    pub fn extend(&mut self, nodes: impl IntoIterator<Item = Vnode>) {
        for mut node in nodes {
            if node.name.is_empty() || node.guid.is_empty() {
                warn!(name = %node.name, "skipping vnode without name or guid");
                continue;
            }
            if node.hostname.is_empty() {
                node.hostname = node.name.clone();
            }
            self.nodes.insert(node.name.clone(), node);
        }
    }

    pub fn lookup(&self, key: &str) -> Option<&Vnode> {
        self.nodes.get(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
#[path = "vnode_tests.rs"]
mod tests;
