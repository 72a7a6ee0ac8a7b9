// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line flags for `wardend`.

use clap::Parser;
use std::path::PathBuf;

/// Module name that enables every built-in module
pub const ALL_MODULES: &str = "all";

#[derive(Debug, Parser)]
#[command(name = "wardend", version, about = "Runs and supervises collection jobs")]
pub struct Args {
    /// Job file directory or glob pattern (repeatable)
    #[arg(long = "config-dir", value_name = "PATH")]
    pub config_dirs: Vec<String>,

    /// Keep following job files for changes
    #[arg(long)]
    pub watch: bool,

    /// Modules to run with default settings ("all" for every module)
    #[arg(long, value_delimiter = ',')]
    pub modules: Vec<String>,

    /// Job state file (default: <state dir>/job_states.json)
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Directory for cross-process job locks (default: <state dir>/locks)
    #[arg(long)]
    pub lock_dir: Option<PathBuf>,

    /// Directory of virtual node definitions
    #[arg(long)]
    pub vnode_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(long)]
    pub debug: bool,
}

/// Turn a `--config-dir` value into a glob pattern. Directories match their
/// `*.toml` files; anything else is used as given.
pub fn config_pattern(value: &str) -> String {
    if std::path::Path::new(value).is_dir() {
        format!("{}/*.toml", value.trim_end_matches('/'))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
#[path = "args_tests.rs"]
mod tests;
