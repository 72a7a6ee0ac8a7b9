// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::config::Config;

/// The complete set of configs one discovery source currently wants active.
///
/// An empty `configs` list is an explicit withdrawal: the source wants
/// nothing. It is not the same as the source sending no update at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    pub source: String,
    pub configs: Vec<Config>,
}

impl Group {
    pub fn new(source: impl Into<String>, configs: Vec<Config>) -> Self {
        Self { source: source.into(), configs }
    }

    /// A withdrawal for `source`.
    pub fn empty(source: impl Into<String>) -> Self {
        Self { source: source.into(), configs: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}
