//! Lock files
//!
//! A lock file pins the solved records of one or more named environments,
//! per platform, together with the channels they were solved against.
//! Records are stored once and referenced by index from every environment
//! and platform that uses them:
//!
//! ```json
//! {
//!   "version": 1,
//!   "environments": {
//!     "default": {
//!       "channels": ["conda-forge"],
//!       "packages": { "linux-64": [0, 1] }
//!     }
//!   },
//!   "packages": [ { "name": "zlib", ... }, { "name": "python", ... } ]
//! }
//! ```

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{EnvError, Result};
use crate::package::{PackageRecord, Platform};
use crate::solver::SolverResult;

/// Format version written by [`LockFileBuilder::finish`]
pub const LOCK_FILE_VERSION: u32 = 1;

/// Name used when a caller does not name its environment
pub const DEFAULT_ENVIRONMENT: &str = "default";

/// A parsed lock file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockFile {
    pub version: u32,

    #[serde(default)]
    pub environments: IndexMap<String, LockedEnvironment>,

    #[serde(default)]
    packages: Vec<PackageRecord>,
}

/// Channels and per-platform package indices of one environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedEnvironment {
    #[serde(default)]
    pub channels: Vec<String>,

    #[serde(default)]
    pub packages: IndexMap<Platform, Vec<usize>>,
}

impl LockFile {
    /// Parse a lock file from JSON
    pub fn from_json(content: &str) -> Result<Self> {
        let lock: LockFile = serde_json::from_str(content)?;
        lock.validate()?;
        Ok(lock)
    }

    /// Read a lock file from disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| EnvError::Lock(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the lock file to disk
    pub fn to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut content = self.to_json()?;
        content.push('\n');
        std::fs::write(path, content)
            .map_err(|e| EnvError::Lock(format!("Failed to write {}: {}", path.display(), e)))?;
        log::debug!("Wrote lock file {}", path.display());
        Ok(())
    }

    pub fn environment(&self, name: &str) -> Option<&LockedEnvironment> {
        self.environments.get(name)
    }

    /// Every distinct record in the file
    pub fn packages(&self) -> &[PackageRecord] {
        &self.packages
    }

    /// The records locked for `environment` on `platform`
    pub fn packages_for(&self, environment: &str, platform: Platform) -> Option<Vec<&PackageRecord>> {
        let indices = self.environments.get(environment)?.packages.get(&platform)?;
        Some(indices.iter().filter_map(|index| self.packages.get(*index)).collect())
    }

    fn validate(&self) -> Result<()> {
        if self.version != LOCK_FILE_VERSION {
            return Err(EnvError::Lock(format!(
                "Unsupported lock file version {}, expected {}",
                self.version, LOCK_FILE_VERSION
            )));
        }
        for (name, environment) in &self.environments {
            for (platform, indices) in &environment.packages {
                if let Some(index) = indices.iter().find(|index| **index >= self.packages.len()) {
                    return Err(EnvError::Lock(format!(
                        "Environment {} ({}) refers to missing package {}",
                        name, platform, index
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Incrementally builds a [`LockFile`]
#[derive(Debug, Default)]
pub struct LockFileBuilder {
    environments: IndexMap<String, LockedEnvironment>,
    packages: IndexMap<String, PackageRecord>,
}

impl LockFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the channels an environment was solved against
    pub fn set_channels(
        &mut self,
        environment: impl Into<String>,
        channels: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        self.environments.entry(environment.into()).or_default().channels =
            channels.into_iter().map(Into::into).collect();
        self
    }

    /// Add one record to an environment and platform. Records shared between
    /// environments or platforms are stored once.
    pub fn add_package(&mut self, environment: impl Into<String>, platform: Platform, record: PackageRecord) -> &mut Self {
        let key = format!("{}/{}", record.subdir, record);
        let index = match self.packages.get_index_of(&key) {
            Some(index) => index,
            None => self.packages.insert_full(key, record).0,
        };

        let locked = self
            .environments
            .entry(environment.into())
            .or_default()
            .packages
            .entry(platform)
            .or_default();
        if !locked.contains(&index) {
            locked.push(index);
        }
        self
    }

    /// Add every installable record of a solve result
    pub fn add_solved(&mut self, environment: impl Into<String>, platform: Platform, solved: &SolverResult) -> &mut Self {
        let environment = environment.into();
        for record in solved.real_packages() {
            self.add_package(environment.clone(), platform, record.as_ref().clone());
        }
        self
    }

    pub fn with_channels(
        mut self,
        environment: impl Into<String>,
        channels: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.set_channels(environment, channels);
        self
    }

    pub fn with_package(mut self, environment: impl Into<String>, platform: Platform, record: PackageRecord) -> Self {
        self.add_package(environment, platform, record);
        self
    }

    pub fn with_solved(mut self, environment: impl Into<String>, platform: Platform, solved: &SolverResult) -> Self {
        self.add_solved(environment, platform, solved);
        self
    }

    pub fn finish(self) -> LockFile {
        LockFile {
            version: LOCK_FILE_VERSION,
            environments: self.environments,
            packages: self.packages.into_values().collect(),
        }
    }
}
