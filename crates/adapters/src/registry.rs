// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-process job registry.
//!
//! Several agent processes may discover the same job. Before starting one, a
//! process claims its full name here; only the holder of the claim runs it.
//! The file-lock implementation keeps one advisory lock per full name
//! (`<dir>/<name>.collector.lock`), released on unregister or process exit.

use fs2::FileExt;
use nix::errno::Errno;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Suffix of per-job lock files
pub const LOCK_FILE_SUFFIX: &str = ".collector.lock";

/// Errors from registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RegistryError {
    /// True when the failure was caused by running out of file descriptors.
    ///
    /// Decided from the OS error code; the message text is only consulted
    /// for errors that carry no code.
    pub fn is_resource_exhausted(&self) -> bool {
        let RegistryError::Io { source, .. } = self;
        match source.raw_os_error() {
            Some(code) => code == Errno::EMFILE as i32 || code == Errno::ENFILE as i32,
            None => source.to_string().to_lowercase().contains("too many open files"),
        }
    }
}

/// Claims full names across processes.
pub trait Registry: Send + Sync + 'static {
    /// Claim `name`. `Ok(false)` means another process already holds it.
    fn register(&self, name: &str) -> Result<bool, RegistryError>;

    /// Release a claim made by this process. Unknown names are ignored.
    fn unregister(&self, name: &str) -> Result<(), RegistryError>;
}

/// Registry backed by advisory file locks in a shared directory.
pub struct FileLockRegistry {
    dir: PathBuf,
    locks: Mutex<HashMap<String, File>>,
}

impl FileLockRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), locks: Mutex::new(HashMap::new()) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn lock_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}{LOCK_FILE_SUFFIX}"))
    }

    /// Names currently held by this process
    pub fn held(&self) -> Vec<String> {
        let mut names: Vec<String> = self.locks.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Release every claim held by this process.
    pub fn unregister_all(&self) {
        let drained: Vec<(String, File)> = self.locks.lock().drain().collect();
        for (name, file) in drained {
            if let Err(e) = FileExt::unlock(&file) {
                debug!(name, error = %e, "unlock failed, lock is released on close");
            }
        }
    }
}

impl Registry for FileLockRegistry {
    fn register(&self, name: &str) -> Result<bool, RegistryError> {
        let mut locks = self.locks.lock();
        if locks.contains_key(name) {
            return Ok(true);
        }

        let path = self.lock_path(name);
        let io_err = |source| RegistryError::Io { path: path.clone(), source };

        std::fs::create_dir_all(&self.dir).map_err(io_err)?;
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_err)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(name, path = %path.display(), "registered");
                locks.insert(name.to_string(), file);
                Ok(true)
            }
            Err(e) if is_contended(&e) => Ok(false),
            Err(e) => Err(io_err(e)),
        }
    }

    fn unregister(&self, name: &str) -> Result<(), RegistryError> {
        let Some(file) = self.locks.lock().remove(name) else {
            return Ok(());
        };
        FileExt::unlock(&file)
            .map_err(|source| RegistryError::Io { path: self.lock_path(name), source })?;
        debug!(name, "unregistered");
        Ok(())
    }
}

impl Drop for FileLockRegistry {
    fn drop(&mut self) {
        self.unregister_all();
    }
}

fn is_contended(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Registry that grants every claim. Used when no lock directory is set.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopRegistry;

impl Registry for NoopRegistry {
    fn register(&self, _name: &str) -> Result<bool, RegistryError> {
        Ok(true)
    }

    fn unregister(&self, _name: &str) -> Result<(), RegistryError> {
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{Registry, RegistryError};
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::path::PathBuf;
    use std::sync::Arc;

    /// Recorded registry call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum RegistryCall {
        Register(String),
        Unregister(String),
    }

    #[derive(Default)]
    struct FakeRegistryState {
        calls: Vec<RegistryCall>,
        held_elsewhere: HashSet<String>,
        exhausted: HashSet<String>,
        failing: HashMap<String, std::io::ErrorKind>,
    }

    /// Fake registry for testing
    #[derive(Clone, Default)]
    pub struct FakeRegistry {
        inner: Arc<Mutex<FakeRegistryState>>,
    }

    impl FakeRegistry {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pretend another process holds `name`.
        pub fn hold_elsewhere(&self, name: &str) {
            self.inner.lock().held_elsewhere.insert(name.to_string());
        }

        /// Fail registration of `name` with EMFILE.
        pub fn exhaust(&self, name: &str) {
            self.inner.lock().exhausted.insert(name.to_string());
        }

        /// Fail registration of `name` with an IO error of `kind`.
        pub fn fail(&self, name: &str, kind: std::io::ErrorKind) {
            self.inner.lock().failing.insert(name.to_string(), kind);
        }

        pub fn calls(&self) -> Vec<RegistryCall> {
            self.inner.lock().calls.clone()
        }
    }

    impl Registry for FakeRegistry {
        fn register(&self, name: &str) -> Result<bool, RegistryError> {
            let mut inner = self.inner.lock();
            inner.calls.push(RegistryCall::Register(name.to_string()));
            if inner.exhausted.contains(name) {
                return Err(RegistryError::Io {
                    path: PathBuf::from(name),
                    source: std::io::Error::from_raw_os_error(nix::errno::Errno::EMFILE as i32),
                });
            }
            if let Some(kind) = inner.failing.get(name) {
                return Err(RegistryError::Io {
                    path: PathBuf::from(name),
                    source: std::io::Error::from(*kind),
                });
            }
            Ok(!inner.held_elsewhere.contains(name))
        }

        fn unregister(&self, name: &str) -> Result<(), RegistryError> {
            self.inner.lock().calls.push(RegistryCall::Unregister(name.to_string()));
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeRegistry, RegistryCall};

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
