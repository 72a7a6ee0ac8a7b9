// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Turning a config into a job instance.

use crate::job::{Job, JobInfo, MetricsSink, ModuleJob};
use crate::module::{Creator, ModuleRegistry};
use std::sync::Arc;
use thiserror::Error;
use wd_adapters::VnodeRegistry;
use wd_core::{Config, ConfigError};

/// Errors that make a config unbuildable. Never retried automatically.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("unknown module '{0}'")]
    UnknownModule(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("vnode '{0}' is not defined")]
    UnknownVnode(String),
}

pub trait JobFactory: Send + Sync + 'static {
    fn build(&self, cfg: &Config) -> Result<Arc<dyn Job>, BuildError>;
}

/// Production factory: module registry + vnode table + metrics sink.
pub struct ModuleJobFactory {
    modules: ModuleRegistry,
    vnodes: VnodeRegistry,
    sink: Arc<dyn MetricsSink>,
}

impl ModuleJobFactory {
    pub fn new(modules: ModuleRegistry, vnodes: VnodeRegistry, sink: Arc<dyn MetricsSink>) -> Self {
        Self { modules, vnodes, sink }
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    /// Resolve job metadata. Zero intervals fall back to the module defaults.
    pub fn job_info(&self, cfg: &Config) -> Result<JobInfo, BuildError> {
        self.resolve(cfg).map(|(_, info)| info)
    }

    fn resolve(&self, cfg: &Config) -> Result<(&Creator, JobInfo), BuildError> {
        let creator = self
            .modules
            .get(cfg.module())
            .ok_or_else(|| BuildError::UnknownModule(cfg.module().to_string()))?;

        let vnode = match cfg.vnode() {
            Some(key) => Some(
                self.vnodes.lookup(key).cloned().ok_or_else(|| BuildError::UnknownVnode(key.into()))?,
            ),
            None => None,
        };

        let update_every = match cfg.update_every() {
            0 => creator.defaults.update_every.max(1),
            n => n,
        };
        let priority = match cfg.priority() {
            0 => creator.defaults.priority,
            n => n,
        };

        let info = JobInfo {
            name: cfg.name().to_string(),
            module: cfg.module().to_string(),
            full_name: cfg.full_name(),
            update_every,
            priority,
            labels: cfg.labels(),
            vnode,
        };
        Ok((creator, info))
    }
}

impl JobFactory for ModuleJobFactory {
    fn build(&self, cfg: &Config) -> Result<Arc<dyn Job>, BuildError> {
        let (creator, info) = self.resolve(cfg)?;
        let module = (creator.create)(cfg)?;

        Ok(Arc::new(ModuleJob::new(
            info,
            cfg.autodetection_retry(),
            cfg.autodetection_tries(),
            module,
            Arc::clone(&self.sink),
        )))
    }
}

#[cfg(test)]
#[path = "factory_tests.rs"]
mod tests;
