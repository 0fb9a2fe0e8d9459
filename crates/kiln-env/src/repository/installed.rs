//! The packages currently installed in an environment prefix

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use glob::glob;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;

use super::InstalledStateReader;
use crate::package::{Channel, PackageRecord};

/// An installed record and whether the user asked for it by name
#[derive(Debug, Clone)]
pub struct InstalledPackage {
    pub record: Arc<PackageRecord>,
    pub explicit: bool,
}

/// Installed packages keyed by lowercased name; one record per name
#[derive(Debug, Clone, Default)]
pub struct InstalledState {
    packages: IndexMap<String, InstalledPackage>,
}

impl InstalledState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `record` as installed, replacing any record of the same name
    pub fn insert(&mut self, record: PackageRecord, explicit: bool) {
        self.packages.insert(
            record.normalized_name(),
            InstalledPackage {
                record: Arc::new(record),
                explicit,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&InstalledPackage> {
        self.packages.get(&name.to_lowercase())
    }

    pub fn get_record(&self, name: &str) -> Option<&Arc<PackageRecord>> {
        self.get(name).map(|p| &p.record)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InstalledPackage)> {
        self.packages.iter().map(|(name, p)| (name.as_str(), p))
    }

    pub fn records(&self) -> impl Iterator<Item = &Arc<PackageRecord>> {
        self.packages.values().map(|p| &p.record)
    }

    /// Rewrite every record channel to its canonical name, so records read
    /// from a prefix compare equal to the same records in the index
    pub fn canonicalize_channels(&mut self, alias: &Url) {
        for package in self.packages.values_mut() {
            let canonical = Channel::canonical_name(&package.record.channel, alias);
            if canonical != package.record.channel {
                log::debug!("Installed {} channel {} is {}", package.record.name, package.record.channel, canonical);
                Arc::make_mut(&mut package.record).channel = canonical;
            }
        }
    }

    /// Names of packages the user installed explicitly
    pub fn explicit_names(&self) -> impl Iterator<Item = &str> {
        self.packages
            .iter()
            .filter(|(_, p)| p.explicit)
            .map(|(name, _)| name.as_str())
    }
}

impl FromIterator<PackageRecord> for InstalledState {
    fn from_iter<I: IntoIterator<Item = PackageRecord>>(iter: I) -> Self {
        let mut state = Self::new();
        for record in iter {
            state.insert(record, false);
        }
        state
    }
}

impl InstalledStateReader for InstalledState {
    fn read(&self) -> anyhow::Result<InstalledState> {
        Ok(self.clone())
    }
}

/// A `conda-meta/*.json` document: the package record plus install metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefixRecord {
    #[serde(flatten)]
    pub record: PackageRecord,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_spec: Option<String>,
}

impl PrefixRecord {
    pub fn is_explicit(&self) -> bool {
        self.requested_spec
            .as_deref()
            .is_some_and(|spec| !spec.trim().is_empty())
    }
}

/// Reads installed state from `<prefix>/conda-meta`
#[derive(Debug, Clone)]
pub struct CondaMetaReader {
    prefix: PathBuf,
}

impl CondaMetaReader {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn meta_dir(&self) -> PathBuf {
        self.prefix.join("conda-meta")
    }
}

impl InstalledStateReader for CondaMetaReader {
    fn read(&self) -> anyhow::Result<InstalledState> {
        let meta_dir = self.meta_dir();
        let mut state = InstalledState::new();
        if !meta_dir.is_dir() {
            log::debug!("{} does not exist, environment is empty", meta_dir.display());
            return Ok(state);
        }

        let pattern = meta_dir.join("*.json");
        let pattern = pattern.to_string_lossy();
        let mut paths: Vec<PathBuf> = glob(&pattern)
            .with_context(|| format!("Invalid metadata pattern {}", pattern))?
            .filter_map(|entry| entry.ok())
            .collect();
        paths.sort();

        for path in paths {
            let contents =
                std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
            let prefix_record: PrefixRecord =
                serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))?;
            let explicit = prefix_record.is_explicit();
            state.insert(prefix_record.record, explicit);
        }

        log::debug!("Read {} installed packages from {}", state.len(), meta_dir.display());
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(name: &str, version: &str) -> PackageRecord {
        PackageRecord::new(name, version.parse().unwrap(), "0")
    }

    #[test]
    fn test_insert_replaces_by_name() {
        let mut state = InstalledState::new();
        state.insert(record("Foo", "1.0"), false);
        state.insert(record("foo", "2.0"), true);

        assert_eq!(state.len(), 1);
        assert_eq!(state.get_record("FOO").unwrap().version.to_string(), "2.0");
        assert_eq!(state.explicit_names().collect::<Vec<_>>(), vec!["foo"]);
    }

    #[test]
    fn test_read_conda_meta() {
        let dir = TempDir::new().unwrap();
        let meta = dir.path().join("conda-meta");
        std::fs::create_dir_all(&meta).unwrap();
        std::fs::write(
            meta.join("python-3.12.1-0.json"),
            r#"{"name": "python", "version": "3.12.1", "build": "0", "channel": "conda-forge", "requested_spec": "python=3.12"}"#,
        )
        .unwrap();
        std::fs::write(
            meta.join("zlib-1.3-0.json"),
            r#"{"name": "zlib", "version": "1.3", "build": "0", "channel": "conda-forge"}"#,
        )
        .unwrap();
        std::fs::write(meta.join("history"), "not a record").unwrap();

        let state = CondaMetaReader::new(dir.path()).read().unwrap();
        assert_eq!(state.len(), 2);
        assert!(state.get("python").unwrap().explicit);
        assert!(!state.get("zlib").unwrap().explicit);
        assert_eq!(state.get_record("zlib").unwrap().channel, "conda-forge");
    }

    #[test]
    fn test_canonicalize_channels() {
        let alias = Url::parse(crate::package::DEFAULT_CHANNEL_ALIAS).unwrap();
        let mut state = InstalledState::new();
        state.insert(
            record("zlib", "1.3").with_channel("https://conda.anaconda.org/conda-forge/linux-64"),
            true,
        );
        state.insert(record("six", "1.16").with_channel("bioconda"), false);

        state.canonicalize_channels(&alias);
        assert_eq!(state.get_record("zlib").unwrap().channel, "conda-forge");
        assert_eq!(state.get_record("six").unwrap().channel, "bioconda");
        assert!(state.get("zlib").unwrap().explicit);
    }

    #[test]
    fn test_missing_conda_meta_is_empty() {
        let dir = TempDir::new().unwrap();
        let state = CondaMetaReader::new(dir.path().join("nope")).read().unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn test_corrupt_record_is_error() {
        let dir = TempDir::new().unwrap();
        let meta = dir.path().join("conda-meta");
        std::fs::create_dir_all(&meta).unwrap();
        std::fs::write(meta.join("bad.json"), "{").unwrap();

        let err = CondaMetaReader::new(dir.path()).read().unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
