// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job configuration: an open key/value record with a structural identity.
//!
//! A [`Config`] is whatever a discoverer produced for one job. Keys wrapped in
//! double underscores (`__source__`, `__provider__`, ...) carry metadata about
//! where the config came from and never take part in its identity: two configs
//! with the same visible content hash identically no matter which source
//! asserted them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub const KEY_NAME: &str = "name";
pub const KEY_MODULE: &str = "module";
pub const KEY_UPDATE_EVERY: &str = "update_every";
pub const KEY_AUTODETECTION_RETRY: &str = "autodetection_retry";
pub const KEY_AUTODETECTION_TRIES: &str = "autodetection_tries";
pub const KEY_PRIORITY: &str = "priority";
pub const KEY_VNODE: &str = "vnode";
pub const KEY_LABELS: &str = "labels";

pub const KEY_SOURCE: &str = "__source__";
pub const KEY_PROVIDER: &str = "__provider__";
pub const KEY_SOURCE_TYPE: &str = "__source_type__";

/// Names of the discovery providers, stored under [`KEY_PROVIDER`].
pub mod provider {
    pub const STATIC: &str = "static";
    pub const FILE_READER: &str = "file reader";
    pub const FILE_WATCHER: &str = "file watcher";
}

/// Returns true for reserved metadata keys (`__name__`).
pub fn is_metadata_key(key: &str) -> bool {
    key.len() > 4 && key.starts_with("__") && key.ends_with("__")
}

/// Errors from reading or decoding a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config has no module")]
    MissingModule,

    #[error("invalid config: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Structural identity of a [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigHash(pub u64);

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Module-level fallbacks applied to configs that leave a field unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub update_every: u64,
    pub autodetection_retry: u64,
    pub priority: i64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self { update_every: 1, autodetection_retry: 0, priority: 70_000 }
    }
}

/// One job's settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config(BTreeMap<String, Value>);

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    /// Reads a non-negative integer, accepting numeric strings.
    fn get_u64(&self, key: &str) -> Option<u64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn module(&self) -> &str {
        self.get_str(KEY_MODULE).unwrap_or_default()
    }

    /// Job name; falls back to the module name when unset.
    pub fn name(&self) -> &str {
        self.get_str(KEY_NAME).unwrap_or_else(|| self.module())
    }

    /// Dedup identity of a running job: `name` when it equals the module,
    /// `module_name` otherwise.
    pub fn full_name(&self) -> String {
        let (name, module) = (self.name(), self.module());
        if name == module {
            name.to_string()
        } else {
            format!("{module}_{name}")
        }
    }

    pub fn update_every(&self) -> u64 {
        self.get_u64(KEY_UPDATE_EVERY).unwrap_or(0)
    }

    /// Seconds between auto-detection attempts; 0 disables retries.
    pub fn autodetection_retry(&self) -> u64 {
        self.get_u64(KEY_AUTODETECTION_RETRY).unwrap_or(0)
    }

    /// Finite auto-detection budget, `None` when unlimited.
    pub fn autodetection_tries(&self) -> Option<u32> {
        self.get_u64(KEY_AUTODETECTION_TRIES).map(|n| n.min(u32::MAX as u64) as u32)
    }

    pub fn priority(&self) -> i64 {
        match self.0.get(KEY_PRIORITY) {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }

    pub fn vnode(&self) -> Option<&str> {
        self.get_str(KEY_VNODE)
    }

    /// User labels. Scalar values are stringified; nested values are skipped.
    pub fn labels(&self) -> BTreeMap<String, String> {
        let Some(Value::Object(map)) = self.0.get(KEY_LABELS) else {
            return BTreeMap::new();
        };
        map.iter()
            .filter_map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => return None,
                };
                Some((k.clone(), v))
            })
            .collect()
    }

    pub fn source(&self) -> &str {
        self.get_str(KEY_SOURCE).unwrap_or_default()
    }

    pub fn provider(&self) -> &str {
        self.get_str(KEY_PROVIDER).unwrap_or_default()
    }

    pub fn source_type(&self) -> &str {
        self.get_str(KEY_SOURCE_TYPE).unwrap_or_default()
    }

    pub fn set_module(&mut self, module: impl Into<String>) {
        self.set(KEY_MODULE, module.into());
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.set(KEY_SOURCE, source.into());
    }

    pub fn set_provider(&mut self, provider: impl Into<String>) {
        self.set(KEY_PROVIDER, provider.into());
    }

    pub fn set_source_type(&mut self, source_type: impl Into<String>) {
        self.set(KEY_SOURCE_TYPE, source_type.into());
    }

    /// Fill unset fields from module defaults. Existing values win.
    pub fn apply_defaults(&mut self, defaults: &Defaults) {
        if self.get_str(KEY_NAME).is_none() {
            let module = self.module().to_string();
            self.set(KEY_NAME, module);
        }
        if self.update_every() == 0 {
            self.set(KEY_UPDATE_EVERY, defaults.update_every);
        }
        if !self.contains_key(KEY_AUTODETECTION_RETRY) {
            self.set(KEY_AUTODETECTION_RETRY, defaults.autodetection_retry);
        }
        if self.priority() == 0 {
            self.set(KEY_PRIORITY, defaults.priority);
        }
    }

    /// Structural hash over every non-metadata field.
    ///
    /// Object keys are fed in sorted order at every depth so the result does
    /// not depend on how the source ordered its fields.
    pub fn hash(&self) -> ConfigHash {
        let mut hasher = Sha256::new();
        for (key, value) in self.0.iter().filter(|(k, _)| !is_metadata_key(k)) {
            feed_str(&mut hasher, key);
            feed_value(&mut hasher, value);
        }
        let digest = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        ConfigHash(u64::from_be_bytes(head))
    }

    /// Decode the visible fields into a typed module config.
    ///
    /// Fields the target type does not declare are ignored; target types must
    /// not use `deny_unknown_fields`, since every config also carries the
    /// common job fields (`name`, `update_every`, ...).
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        let visible: Map<String, Value> = self
            .0
            .iter()
            .filter(|(k, _)| !is_metadata_key(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(serde_json::from_value(Value::Object(visible))?)
    }
}

impl FromIterator<(String, Value)> for Config {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, Value>> for Config {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

fn feed_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_be_bytes());
    hasher.update(s.as_bytes());
}

fn feed_value(hasher: &mut Sha256, value: &Value) {
    match value {
        Value::Null => hasher.update([0u8]),
        Value::Bool(b) => hasher.update([1u8, *b as u8]),
        Value::Number(n) => {
            hasher.update([2u8]);
            feed_str(hasher, &n.to_string());
        }
        Value::String(s) => {
            hasher.update([3u8]);
            feed_str(hasher, s);
        }
        Value::Array(items) => {
            hasher.update([4u8]);
            hasher.update((items.len() as u64).to_be_bytes());
            for item in items {
                feed_value(hasher, item);
            }
        }
        Value::Object(map) => {
            hasher.update([5u8]);
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            hasher.update((keys.len() as u64).to_be_bytes());
            for key in keys {
                feed_str(hasher, key);
                if let Some(v) = map.get(key) {
                    feed_value(hasher, v);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
