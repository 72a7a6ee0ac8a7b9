// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Set-diff of discovery groups into global add/remove deltas.
//!
//! Every source reports its complete current config list. The cache keeps
//! each source's last list and a global reference count per config hash, so a
//! config is only reported added when the first source asserts it and only
//! reported removed when the last source drops it.

use std::collections::HashMap;
use wd_core::{Config, ConfigHash, Group};

#[derive(Debug, Default)]
pub struct GroupCache {
    sources: HashMap<String, HashMap<ConfigHash, Config>>,
    global: HashMap<ConfigHash, usize>,
}

impl GroupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one source's latest list. Returns `(added, removed)`, both in
    /// unspecified order.
    pub fn put(&mut self, group: &Group) -> (Vec<Config>, Vec<Config>) {
        if group.is_empty() {
            return (Vec::new(), self.put_empty(&group.source));
        }
        self.put_not_empty(group)
    }

    fn put_empty(&mut self, source: &str) -> Vec<Config> {
        let Some(set) = self.sources.remove(source) else {
            return Vec::new();
        };
        set.into_iter().filter_map(|(hash, cfg)| self.release(hash).then_some(cfg)).collect()
    }

    fn put_not_empty(&mut self, group: &Group) -> (Vec<Config>, Vec<Config>) {
        let incoming: HashMap<ConfigHash, &Config> =
            group.configs.iter().map(|cfg| (cfg.hash(), cfg)).collect();

        let set = self.sources.entry(group.source.clone()).or_default();
        let mut added = Vec::new();
        for (hash, cfg) in &incoming {
            if set.contains_key(hash) {
                continue;
            }
            set.insert(*hash, (*cfg).clone());
            let count = self.global.entry(*hash).or_insert(0);
            *count += 1;
            if *count == 1 {
                added.push((*cfg).clone());
            }
        }

        let stale: Vec<ConfigHash> =
            set.keys().filter(|hash| !incoming.contains_key(*hash)).copied().collect();
        let mut dropped = Vec::with_capacity(stale.len());
        for hash in stale {
            if let Some(cfg) = set.remove(&hash) {
                dropped.push((hash, cfg));
            }
        }
        let removed = dropped
            .into_iter()
            .filter_map(|(hash, cfg)| self.release(hash).then_some(cfg))
            .collect();

        (added, removed)
    }

    /// Decrement the refcount of `hash`; true when it reached zero.
    fn release(&mut self, hash: ConfigHash) -> bool {
        let Some(count) = self.global.get_mut(&hash) else {
            return false;
        };
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.global.remove(&hash);
            return true;
        }
        false
    }

    /// Number of sources currently asserting `hash`.
    pub fn refcount(&self, hash: ConfigHash) -> usize {
        self.global.get(&hash).copied().unwrap_or(0)
    }

    /// Number of distinct live configs
    pub fn len(&self) -> usize {
        self.global.len()
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

#[cfg(test)]
#[path = "group_cache_tests.rs"]
mod tests;
