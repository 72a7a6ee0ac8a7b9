// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TOML job files.
//!
//! ```toml
//! # ping.toml: module name taken from the file stem
//! update_every = 5          # per-file defaults
//! autodetection_retry = 10
//!
//! [[jobs]]
//! name = "local"
//! host = "127.0.0.1"
//! ```
//!
//! A top-level `module` key overrides the file stem.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use wd_core::config::{
    KEY_AUTODETECTION_RETRY, KEY_AUTODETECTION_TRIES, KEY_MODULE, KEY_PRIORITY, KEY_UPDATE_EVERY,
};
use wd_core::{Config, Defaults};

/// Per-module defaults, keyed by module name
pub type ModuleDefaults = BTreeMap<String, Defaults>;

/// Top-level keys copied into every job that lacks them
const FILE_DEFAULT_KEYS: &[&str] =
    &[KEY_UPDATE_EVERY, KEY_AUTODETECTION_RETRY, KEY_AUTODETECTION_TRIES, KEY_PRIORITY];

const KEY_JOBS: &str = "jobs";

/// Source type of configs read from user files
pub const SOURCE_TYPE_USER: &str = "user";

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid job file {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },

    #[error("invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// Read and parse one job file.
pub fn read_file(
    path: &Path,
    defaults: &ModuleDefaults,
    provider: &str,
) -> Result<Vec<Config>, DiscoveryError> {
    let content = std::fs::read_to_string(path)
        .map_err(|source| DiscoveryError::Io { path: path.to_path_buf(), source })?;
    parse_file(path, &content, defaults, provider)
}

/// Parse job file `content` read from `path`.
///
/// Every returned config has its module, metadata and defaults filled in.
pub fn parse_file(
    path: &Path,
    content: &str,
    defaults: &ModuleDefaults,
    provider: &str,
) -> Result<Vec<Config>, DiscoveryError> {
    let invalid = |reason: &str| DiscoveryError::Invalid {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let table: toml::Table = toml::from_str(content)
        .map_err(|source| DiscoveryError::Parse { path: path.to_path_buf(), source })?;

    let module = match table.get(KEY_MODULE) {
        Some(toml::Value::String(m)) if !m.is_empty() => m.clone(),
        Some(_) => return Err(invalid("'module' must be a non-empty string")),
        None => path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| invalid("cannot derive module from file name"))?,
    };
    let module_defaults = defaults.get(&module).copied().unwrap_or_default();
    let source = path.display().to_string();

    let jobs = match table.get(KEY_JOBS) {
        None => return Ok(Vec::new()),
        Some(toml::Value::Array(jobs)) => jobs,
        Some(_) => return Err(invalid("'jobs' must be an array of tables")),
    };

    let mut configs = Vec::with_capacity(jobs.len());
    for job in jobs {
        let toml::Value::Table(job) = job else {
            return Err(invalid("'jobs' must be an array of tables"));
        };
        let mut cfg = Config::new();
        for (key, value) in job {
            cfg.set(key.clone(), to_json(value));
        }
        for key in FILE_DEFAULT_KEYS {
            if let (false, Some(value)) = (cfg.contains_key(key), table.get(*key)) {
                cfg.set(*key, to_json(value));
            }
        }
        cfg.set_module(module.clone());
        cfg.set_source(source.clone());
        cfg.set_provider(provider);
        cfg.set_source_type(SOURCE_TYPE_USER);
        cfg.apply_defaults(&module_defaults);
        configs.push(cfg);
    }
    Ok(configs)
}

fn to_json(value: &toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => s.clone().into(),
        toml::Value::Integer(i) => (*i).into(),
        toml::Value::Float(f) => (*f).into(),
        toml::Value::Boolean(b) => (*b).into(),
        toml::Value::Datetime(d) => d.to_string().into(),
        toml::Value::Array(a) => a.iter().map(to_json).collect::<Vec<_>>().into(),
        toml::Value::Table(t) => {
            t.iter().map(|(k, v)| (k.clone(), to_json(v))).collect::<serde_json::Map<_, _>>().into()
        }
    }
}

/// Expand glob patterns into a sorted, de-duplicated list of files.
pub fn expand(patterns: &[String]) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut files = Vec::new();
    for pattern in patterns {
        let paths = glob::glob(pattern)
            .map_err(|source| DiscoveryError::Pattern { pattern: pattern.clone(), source })?;
        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => tracing::debug!(pattern = %pattern, error = %e, "skipping unreadable path"),
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
