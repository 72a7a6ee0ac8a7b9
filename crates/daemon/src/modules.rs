// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Modules compiled into `wardend`.

use serde::Deserialize;
use wd_core::{Config, ConfigError};
use wd_engine::{Creator, Metrics, Module, ModuleError, ModuleRegistry};

pub const EXAMPLE: &str = "example";

/// Registry of every built-in module.
pub fn builtin() -> ModuleRegistry {
    let mut modules = ModuleRegistry::new();
    modules.register(EXAMPLE, Creator::new(create_example));
    modules
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ExampleConfig {
    /// Number of counters to report
    dimensions: usize,
    /// Make detection fail, for exercising retries
    fail_check: bool,
}

impl Default for ExampleConfig {
    fn default() -> Self {
        Self { dimensions: 2, fail_check: false }
    }
}

/// Reports `dimensions` counters, counter `i` growing by `i + 1` per collection.
struct Example {
    fail_check: bool,
    counters: Vec<i64>,
}

fn create_example(cfg: &Config) -> Result<Box<dyn Module>, ConfigError> {
    let c: ExampleConfig = cfg.decode()?;
    Ok(Box::new(Example { fail_check: c.fail_check, counters: vec![0; c.dimensions] }))
}

impl Module for Example {
    fn check(&mut self) -> Result<(), ModuleError> {
        if self.fail_check {
            return Err(ModuleError::Check("fail_check is set".into()));
        }
        Ok(())
    }

    fn collect(&mut self) -> Result<Metrics, ModuleError> {
        let mut metrics = Metrics::new();
        for (i, counter) in self.counters.iter_mut().enumerate() {
            *counter += i as i64 + 1;
            metrics.insert(format!("dim{i}"), *counter);
        }
        Ok(metrics)
    }
}

#[cfg(test)]
#[path = "modules_tests.rs"]
mod tests;
