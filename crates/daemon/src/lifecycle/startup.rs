// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup: load recovery state and wire the managers together.

use std::sync::Arc;

use tracing::{info, warn};
use wd_adapters::{FileLockRegistry, VnodeRegistry};
use wd_discovery::{DiscoveryManager, FileReader, FileWatcher, StaticDiscoverer};
use wd_engine::{BuildManager, LogSink, ModuleJobFactory, ModuleRegistry, RunManager};
use wd_storage::{PersistedStates, StateManager};

use super::{Config, Daemon, LifecycleError};
use crate::args::ALL_MODULES;
use crate::modules;

/// Build a daemon from `config` using the built-in modules.
pub fn startup(config: &Config) -> Result<Daemon, LifecycleError> {
    startup_with(config, modules::builtin())
}

pub(crate) fn startup_with(
    config: &Config,
    modules: ModuleRegistry,
) -> Result<Daemon, LifecycleError> {
    // 1. Directories
    if let Some(parent) = config.state_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::create_dir_all(&config.lock_dir)?;

    // 2. What the previous run left behind
    let prev = PersistedStates::load_or_default(&config.state_path);
    info!(jobs = prev.len(), path = %config.state_path.display(), "loaded previous job states");

    let vnodes = match &config.vnode_dir {
        Some(dir) => VnodeRegistry::load_dir(dir)?,
        None => VnodeRegistry::new(),
    };
    if !vnodes.is_empty() {
        info!(vnodes = vnodes.len(), "loaded virtual nodes");
    }

    // 3. Discovery
    let defaults = modules.defaults();
    let enabled = enabled_modules(&config.modules, &modules);
    let mut discovery = DiscoveryManager::new();
    if !enabled.is_empty() {
        discovery = discovery
            .with_discoverer(Arc::new(StaticDiscoverer::new(enabled, defaults.clone())));
    }
    if !config.patterns.is_empty() {
        discovery = if config.watch {
            discovery.with_discoverer(Arc::new(FileWatcher::new(config.patterns.clone(), defaults)))
        } else {
            discovery.with_discoverer(Arc::new(FileReader::new(config.patterns.clone(), defaults)))
        };
    }
    if discovery.is_empty() {
        warn!("no modules or job files configured, nothing will run");
    }

    // 4. Managers
    let state = Arc::new(StateManager::new(&config.state_path));
    let registry = Arc::new(FileLockRegistry::new(&config.lock_dir));
    let runner = Arc::new(RunManager::new());
    let factory = ModuleJobFactory::new(modules, vnodes, Arc::new(LogSink));
    let build = BuildManager::new(Arc::new(factory), runner.clone())
        .with_registry(registry.clone())
        .with_saver(state.clone())
        .with_prev_state(Arc::new(prev));

    Ok(Daemon { config: config.clone(), discovery, build, runner, registry, state })
}

/// Resolve `--modules`: "all" expands to every module, unknown names are dropped.
pub(super) fn enabled_modules(requested: &[String], modules: &ModuleRegistry) -> Vec<String> {
    if requested.iter().any(|m| m == ALL_MODULES) {
        return modules.names().map(str::to_string).collect();
    }
    requested
        .iter()
        .filter(|m| {
            let known = modules.get(m).is_some();
            if !known {
                warn!(module = %m, "unknown module, skipping");
            }
            known
        })
        .cloned()
        .collect()
}
