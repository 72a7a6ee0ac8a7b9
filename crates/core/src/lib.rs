// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wd-core: shared types for the Warden job orchestrator

pub mod config;
pub mod group;
pub mod state;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::{is_metadata_key, provider, Config, ConfigError, ConfigHash, Defaults};
pub use group::Group;
pub use state::{JobState, NoopState, StateReader, StateSaver};
