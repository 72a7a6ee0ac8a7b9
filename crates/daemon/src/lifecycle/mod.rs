// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, run, shutdown.

mod startup;
pub use startup::startup;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wd_adapters::{FileLockRegistry, VnodeError};
use wd_discovery::DiscoveryManager;
use wd_engine::{BuildManager, RunManager};
use wd_storage::{StateError, StateManager};

use crate::args::{config_pattern, Args};

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Glob patterns of job files
    pub patterns: Vec<String>,
    /// Follow job files instead of reading them once
    pub watch: bool,
    /// Modules enabled without a job file
    pub modules: Vec<String>,
    /// Path to the job state file
    pub state_path: PathBuf,
    /// Directory holding cross-process job locks
    pub lock_dir: PathBuf,
    /// Directory of virtual node definitions
    pub vnode_dir: Option<PathBuf>,
}

impl Config {
    /// Build the configuration from command-line flags.
    ///
    /// Paths not given on the command line live under the state directory
    /// (`$WARDEN_STATE_DIR`, `$XDG_STATE_HOME/warden` or `~/.local/state/warden`).
    pub fn from_args(args: &Args) -> Result<Self, LifecycleError> {
        let (state_path, lock_dir) = match (&args.state_file, &args.lock_dir) {
            (Some(state), Some(locks)) => (state.clone(), locks.clone()),
            (state, locks) => {
                let dir = crate::env::state_dir()?;
                (
                    state.clone().unwrap_or_else(|| dir.join("job_states.json")),
                    locks.clone().unwrap_or_else(|| dir.join("locks")),
                )
            }
        };

        Ok(Self {
            patterns: args.config_dirs.iter().map(|v| config_pattern(v)).collect(),
            watch: args.watch,
            modules: args.modules.clone(),
            state_path,
            lock_dir,
            vnode_dir: args.vnode_dir.clone(),
        })
    }
}

/// A started daemon, ready to run.
pub struct Daemon {
    pub config: Config,
    discovery: DiscoveryManager,
    build: BuildManager,
    runner: Arc<RunManager>,
    registry: Arc<FileLockRegistry>,
    state: Arc<StateManager>,
}

impl Daemon {
    /// Run until `shutdown` resolves, then stop everything in order:
    /// discovery and the build manager first, then running jobs, then the
    /// job locks, and finally the state file.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<(), LifecycleError> {
        let Daemon { config, discovery, build, runner, registry, state } = self;
        let cancel = CancellationToken::new();
        let (groups_tx, groups_rx) = mpsc::channel(1);

        let state_task = tokio::spawn({
            let state = Arc::clone(&state);
            let cancel = cancel.clone();
            async move { state.run(cancel).await }
        });
        let run_task = tokio::spawn({
            let runner = Arc::clone(&runner);
            let cancel = cancel.clone();
            async move { runner.run(cancel).await }
        });
        let build_task = tokio::spawn(build.run(cancel.clone(), groups_rx));
        let discovery_task = tokio::spawn(discovery.run(cancel.clone(), groups_tx));

        info!(
            patterns = config.patterns.len(),
            modules = config.modules.len(),
            watch = config.watch,
            state = %config.state_path.display(),
            "warden started"
        );

        shutdown.await;
        info!("shutting down");
        cancel.cancel();

        join("discovery", discovery_task).await;
        join("build manager", build_task).await;
        join("scheduler", run_task).await;
        runner.cleanup().await;
        registry.unregister_all();
        join("state manager", state_task).await;
        state.flush()?;

        info!("shutdown complete");
        Ok(())
    }
}

async fn join(name: &str, task: JoinHandle<()>) {
    if let Err(e) = task.await {
        warn!(task = name, error = %e, "task ended abnormally");
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Vnode error: {0}")]
    Vnode(#[from] VnodeError),

    #[error("State error: {0}")]
    State(#[from] StateError),
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
