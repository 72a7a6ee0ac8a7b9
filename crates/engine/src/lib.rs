// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wd-engine: config diffing, job build/lifecycle and scheduling

pub mod autodetect;
mod build;
pub mod factory;
mod group_cache;
pub mod job;
pub mod module;
mod retry;
pub mod run;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use autodetect::{is_inside_cluster, AutoDetect};
pub use build::BuildManager;
pub use factory::{BuildError, JobFactory, ModuleJobFactory};
pub use group_cache::GroupCache;
pub use job::{Job, JobInfo, LogSink, MetricsSink, ModuleJob};
pub use module::{Creator, Metrics, Module, ModuleError, ModuleRegistry};
pub use run::{RunManager, Runner, TICK_INTERVAL};
