// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Discoverer for modules enabled without a job file.

use crate::discoverer::{send_groups, Discoverer};
use crate::file::ModuleDefaults;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use wd_core::{provider, Config, Group};

/// Source name of the static group
pub const INTERNAL_SOURCE: &str = "internal";

const SOURCE_TYPE_STOCK: &str = "stock";

/// Emits one `{module, name}` config per enabled module, once.
pub struct StaticDiscoverer {
    modules: Vec<String>,
    defaults: ModuleDefaults,
}

impl StaticDiscoverer {
    pub fn new(modules: impl IntoIterator<Item = impl Into<String>>, defaults: ModuleDefaults) -> Self {
        Self { modules: modules.into_iter().map(Into::into).collect(), defaults }
    }

    pub fn group(&self) -> Group {
        let configs = self
            .modules
            .iter()
            .map(|module| {
                let mut cfg = Config::new();
                cfg.set_module(module.as_str());
                cfg.set_source(INTERNAL_SOURCE);
                cfg.set_provider(provider::STATIC);
                cfg.set_source_type(SOURCE_TYPE_STOCK);
                cfg.apply_defaults(&self.defaults.get(module).copied().unwrap_or_default());
                cfg
            })
            .collect();
        Group::new(INTERNAL_SOURCE, configs)
    }
}

#[async_trait]
impl Discoverer for StaticDiscoverer {
    fn name(&self) -> &str {
        provider::STATIC
    }

    async fn discover(&self, cancel: CancellationToken, out: mpsc::Sender<Vec<Group>>) {
        let group = self.group();
        debug!(configs = group.configs.len(), "static modules");
        send_groups(&cancel, &out, vec![group]).await;
    }
}

#[cfg(test)]
#[path = "builtin_tests.rs"]
mod tests;
