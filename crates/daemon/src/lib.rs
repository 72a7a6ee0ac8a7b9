// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Warden daemon library
//!
//! Wiring for the `wardend` binary, exposed so integration tests can drive a
//! full daemon in-process.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod args;
pub mod env;
pub mod lifecycle;
pub mod modules;

pub use args::Args;
pub use lifecycle::{startup, Config, Daemon, LifecycleError};
