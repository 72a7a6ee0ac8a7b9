// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for the resources Warden shares with the outside world

pub mod registry;
pub mod vnode;

pub use registry::{FileLockRegistry, NoopRegistry, Registry, RegistryError, LOCK_FILE_SUFFIX};
pub use vnode::{Vnode, VnodeError, VnodeRegistry};

#[cfg(any(test, feature = "test-support"))]
pub use registry::{FakeRegistry, RegistryCall};
