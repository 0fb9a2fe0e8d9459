//! The read-only package index the solver works against

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;

use super::VirtualPackage;
use crate::package::{PackageRecord, Platform};

/// Records fetched from one subdir of one channel
#[derive(Debug, Clone)]
pub struct ChannelData {
    pub channel: String,
    pub subdir: String,
    pub records: Vec<PackageRecord>,
}

impl ChannelData {
    pub fn new(channel: impl Into<String>, subdir: impl Into<String>, records: Vec<PackageRecord>) -> Self {
        Self {
            channel: channel.into(),
            subdir: subdir.into(),
            records,
        }
    }
}

/// Channel name used for virtual package records
const VIRTUAL_CHANNEL: &str = "@";

/// Package records by lowercased name.
///
/// Records for a name keep the order they were loaded in, which is channel
/// priority order: everything from the first listed channel comes before
/// anything from the second.
#[derive(Debug, Clone)]
pub struct RepositoryIndex {
    platform: Platform,
    packages: IndexMap<String, Vec<Arc<PackageRecord>>>,
    priorities: IndexMap<String, usize>,
    len: usize,
}

impl RepositoryIndex {
    /// Create an empty index for `platform`
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            packages: IndexMap::new(),
            priorities: IndexMap::new(),
            len: 0,
        }
    }

    /// Build an index from fetched channel data.
    ///
    /// Data for subdirs other than `platform` and `noarch` is ignored. A
    /// channel's priority is the position of its first appearance. Exact
    /// duplicates within one channel keep the first record; the same tuple
    /// from two channels is kept twice and the solver prefers the higher
    /// priority channel.
    pub fn load(channel_data: Vec<ChannelData>, platform: Platform) -> Self {
        let start = std::time::Instant::now();
        let mut index = Self::new(platform);
        let mut seen = HashSet::new();
        let mut duplicates = 0usize;

        for data in channel_data {
            if data.subdir != platform.as_str() && data.subdir != Platform::NoArch.as_str() {
                log::debug!("Skipping {}/{}: not a {} subdir", data.channel, data.subdir, platform);
                continue;
            }

            let next_priority = index.priorities.len();
            index.priorities.entry(data.channel.clone()).or_insert(next_priority);

            for mut record in data.records {
                record.channel.clone_from(&data.channel);
                if record.subdir.is_empty() {
                    record.subdir = data.subdir.clone();
                }

                let key = (
                    data.channel.clone(),
                    record.normalized_name(),
                    record.version.clone(),
                    record.build.clone(),
                    record.build_number,
                );
                if !seen.insert(key) {
                    duplicates += 1;
                    continue;
                }

                index.push(record);
            }
        }

        log::info!(
            "Loaded {} records for {} names from {} channels in {:.3} seconds ({} duplicates dropped)",
            index.len,
            index.packages.len(),
            index.priorities.len(),
            start.elapsed().as_secs_f64(),
            duplicates
        );
        index
    }

    fn push(&mut self, record: PackageRecord) {
        self.packages
            .entry(record.normalized_name())
            .or_default()
            .push(Arc::new(record));
        self.len += 1;
    }

    /// Add virtual packages, replacing earlier virtual records of the same name
    pub fn add_virtual_packages(&mut self, packages: &[VirtualPackage]) {
        for package in packages {
            let mut record = package.to_record();
            record.channel = VIRTUAL_CHANNEL.to_string();
            record.subdir = self.platform.as_str().to_string();

            let entry = self.packages.entry(record.normalized_name()).or_default();
            let before = entry.len();
            entry.retain(|r| !r.is_virtual());
            self.len -= before - entry.len();

            log::debug!("Adding virtual package {}", package);
            self.push(record);
        }
    }

    /// All records named `name`, case-insensitively, in priority order.
    /// Unknown names yield an empty slice.
    pub fn lookup(&self, name: &str) -> &[Arc<PackageRecord>] {
        self.packages
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Priority of the channel a record came from; lower is preferred
    pub fn priority(&self, record: &PackageRecord) -> usize {
        if record.is_virtual() {
            return 0;
        }
        self.priorities.get(&record.channel).copied().unwrap_or(usize::MAX)
    }

    /// Channel names in priority order
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.priorities.keys().map(String::as_str)
    }

    /// Package names in load order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Total number of records
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, version: &str) -> PackageRecord {
        PackageRecord::new(name, version.parse().unwrap(), "0")
    }

    #[test]
    fn test_load_filters_subdirs() {
        let index = RepositoryIndex::load(
            vec![
                ChannelData::new("a", "linux-64", vec![record("foo", "1.0")]),
                ChannelData::new("a", "noarch", vec![record("bar", "1.0")]),
                ChannelData::new("a", "osx-64", vec![record("baz", "1.0")]),
            ],
            Platform::Linux64,
        );

        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup("foo").len(), 1);
        assert_eq!(index.lookup("bar")[0].subdir, "noarch");
        assert!(index.lookup("baz").is_empty());
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let index = RepositoryIndex::load(
            vec![ChannelData::new("a", "linux-64", vec![record("PyYAML", "6.0")])],
            Platform::Linux64,
        );
        assert_eq!(index.lookup("pyyaml").len(), 1);
        assert_eq!(index.lookup("PYYAML").len(), 1);
        assert!(index.lookup("missing").is_empty());
    }

    #[test]
    fn test_priority_follows_first_appearance() {
        let index = RepositoryIndex::load(
            vec![
                ChannelData::new("b", "noarch", vec![record("foo", "1.0")]),
                ChannelData::new("a", "linux-64", vec![record("foo", "1.0")]),
                ChannelData::new("b", "linux-64", vec![record("foo", "2.0")]),
            ],
            Platform::Linux64,
        );

        let channels: Vec<_> = index.channels().collect();
        assert_eq!(channels, vec!["b", "a"]);

        let foo = index.lookup("foo");
        assert_eq!(foo.len(), 3);
        assert_eq!(index.priority(&foo[0]), 0);
        assert_eq!(index.priority(&foo[1]), 1);
        assert_eq!(index.priority(&foo[2]), 0);
    }

    #[test]
    fn test_duplicates_within_channel_dropped() {
        let first = record("foo", "1.0").with_sha256("aa");
        let index = RepositoryIndex::load(
            vec![
                ChannelData::new("a", "linux-64", vec![first, record("foo", "1.0.0").with_sha256("bb")]),
                ChannelData::new("b", "linux-64", vec![record("foo", "1.0")]),
            ],
            Platform::Linux64,
        );

        let foo = index.lookup("foo");
        assert_eq!(foo.len(), 2);
        assert_eq!(foo[0].sha256.as_deref(), Some("aa"));
        assert_eq!(foo[1].channel, "b");
    }

    #[test]
    fn test_add_virtual_packages_replaces_by_name() {
        let mut index = RepositoryIndex::new(Platform::Linux64);
        index.add_virtual_packages(&["__glibc=2.17".parse().unwrap()]);
        index.add_virtual_packages(&["__glibc=2.28".parse().unwrap(), "__unix".parse().unwrap()]);

        assert_eq!(index.len(), 2);
        let glibc = index.lookup("__glibc");
        assert_eq!(glibc.len(), 1);
        assert!(glibc[0].is_virtual());
        assert_eq!(glibc[0].version.to_string(), "2.28");
        assert_eq!(index.priority(&glibc[0]), 0);
    }
}
