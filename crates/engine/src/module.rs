// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collector module contract and the name → constructor registry.
//!
//! A module knows how to talk to one kind of target system. Warden never looks
//! inside: it asks a [`Creator`] for a fresh instance per config, probes it
//! once with [`Module::check`], then calls [`Module::collect`] on the clock.

use std::collections::BTreeMap;
use thiserror::Error;
use wd_core::{Config, ConfigError, Defaults};

/// One collection result: metric id → value.
pub type Metrics = BTreeMap<String, i64>;

/// Errors raised by module implementations
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("check failed: {0}")]
    Check(String),
    #[error("collect failed: {0}")]
    Collect(String),
}

pub trait Module: Send + 'static {
    /// One-shot probe. `Ok` means the target can be collected from.
    fn check(&mut self) -> Result<(), ModuleError>;

    fn collect(&mut self) -> Result<Metrics, ModuleError>;

    /// Release connections and other resources. Called once, last.
    fn cleanup(&mut self) {}
}

/// Builds a module from its config. Schema errors surface as [`ConfigError`].
pub type CreateFn = fn(&Config) -> Result<Box<dyn Module>, ConfigError>;

/// How to make instances of one module.
#[derive(Clone, Copy)]
pub struct Creator {
    /// Applied to configs that leave the fields unset
    pub defaults: Defaults,
    pub create: CreateFn,
}

impl Creator {
    /// Creator with default [`Defaults`].
    pub fn new(create: CreateFn) -> Self {
        Self { defaults: Defaults::default(), create }
    }

    pub fn with_defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }
}

/// Module name → [`Creator`]. Filled once at startup, read-only after.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    creators: BTreeMap<String, Creator>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `creator` under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, creator: Creator) {
        self.creators.insert(name.into(), creator);
    }

    pub fn get(&self, name: &str) -> Option<&Creator> {
        self.creators.get(name)
    }

    /// Registered module names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.creators.keys().map(String::as_str)
    }

    /// Module name → defaults, for discoverers that fill in configs.
    pub fn defaults(&self) -> BTreeMap<String, Defaults> {
        self.creators.iter().map(|(name, c)| (name.clone(), c.defaults)).collect()
    }
}
