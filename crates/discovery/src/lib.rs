// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wd-discovery: config sources and the manager that merges them

mod builtin;
mod discoverer;
pub mod file;
mod manager;
mod reader;
mod watcher;

pub use builtin::{StaticDiscoverer, INTERNAL_SOURCE};
pub use discoverer::{send_groups, Discoverer};
pub use file::{parse_file, DiscoveryError, ModuleDefaults};
pub use manager::{DiscoveryManager, SEND_EVERY};
pub use reader::FileReader;
pub use watcher::{FileWatcher, RESCAN_EVERY};
