//! Package records as published in channel metadata

use std::fmt;

use serde::{Deserialize, Serialize};

use kiln_version::Version;

use super::MatchSpec;

/// Whether a record is an installable artifact or a host capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    #[default]
    Real,
    Virtual,
}

/// A single build of a package published in a channel subdir.
///
/// Identity is (name, version, build, build number, channel). Records are
/// shared behind `Arc` once loaded into an index and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,

    pub version: Version,

    #[serde(default)]
    pub build: String,

    #[serde(default)]
    pub build_number: u64,

    #[serde(default)]
    pub depends: Vec<MatchSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constrains: Vec<MatchSpec>,

    #[serde(default)]
    pub channel: String,

    #[serde(default)]
    pub subdir: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(rename = "fn", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    #[serde(default, skip_serializing_if = "is_real")]
    pub kind: RecordKind,
}

fn is_real(kind: &RecordKind) -> bool {
    *kind == RecordKind::Real
}

impl PackageRecord {
    /// Create a record with no dependencies and no channel
    pub fn new(name: impl Into<String>, version: Version, build: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version,
            build: build.into(),
            build_number: 0,
            depends: Vec::new(),
            constrains: Vec::new(),
            channel: String::new(),
            subdir: String::new(),
            md5: None,
            sha256: None,
            size: None,
            file_name: None,
            kind: RecordKind::Real,
        }
    }

    pub fn with_build_number(mut self, build_number: u64) -> Self {
        self.build_number = build_number;
        self
    }

    pub fn with_depends(mut self, depends: Vec<MatchSpec>) -> Self {
        self.depends = depends;
        self
    }

    pub fn with_constrains(mut self, constrains: Vec<MatchSpec>) -> Self {
        self.constrains = constrains;
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.subdir = subdir.into();
        self
    }

    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into());
        self
    }

    pub fn with_kind(mut self, kind: RecordKind) -> Self {
        self.kind = kind;
        self
    }

    /// The lowercased package name used for lookups
    pub fn normalized_name(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn is_virtual(&self) -> bool {
        self.kind == RecordKind::Virtual
    }

    /// Compare the identity tuple (name, version, build, build number, channel)
    pub fn same_identity(&self, other: &PackageRecord) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && self.version == other.version
            && self.build == other.build
            && self.build_number == other.build_number
            && self.channel == other.channel
    }

    /// Compare identity and, where both sides carry one, the content hash
    pub fn same_content(&self, other: &PackageRecord) -> bool {
        if !self.same_identity(other) {
            return false;
        }
        if let (Some(a), Some(b)) = (&self.sha256, &other.sha256) {
            return a.eq_ignore_ascii_case(b);
        }
        match (&self.md5, &other.md5) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => true,
        }
    }

    /// Names of all dependencies, lowercased, in declaration order
    pub fn dependency_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.depends.iter().map(|spec| spec.name())
    }
}

impl fmt::Display for PackageRecord {
    /// Formats as `name-version-build`, prefixed with `channel::` when known
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.channel.is_empty() && !self.is_virtual() {
            write!(f, "{}::", self.channel)?;
        }
        write!(f, "{}-{}", self.name, self.version)?;
        if !self.build.is_empty() {
            write!(f, "-{}", self.build)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, version: &str, build: &str) -> PackageRecord {
        PackageRecord::new(name, version.parse().unwrap(), build)
    }

    #[test]
    fn test_display() {
        assert_eq!(record("foo", "1.0", "py_0").to_string(), "foo-1.0-py_0");
        assert_eq!(record("foo", "1.0", "").to_string(), "foo-1.0");
        assert_eq!(
            record("foo", "1.0", "0").with_channel("conda-forge").to_string(),
            "conda-forge::foo-1.0-0"
        );
    }

    #[test]
    fn test_identity() {
        let a = record("Foo", "1.0", "0").with_channel("a");
        assert!(a.same_identity(&record("foo", "1.0.0", "0").with_channel("a")));
        assert!(!a.same_identity(&record("foo", "1.0", "1").with_channel("a")));
        assert!(!a.same_identity(&record("foo", "1.0", "0").with_channel("b")));
        assert!(!a.same_identity(&record("foo", "1.0", "0").with_channel("a").with_build_number(1)));
    }

    #[test]
    fn test_same_content_checks_hashes() {
        let a = record("foo", "1.0", "0").with_sha256("AA");
        assert!(a.same_content(&record("foo", "1.0", "0").with_sha256("aa")));
        assert!(!a.same_content(&record("foo", "1.0", "0").with_sha256("bb")));
        assert!(a.same_content(&record("foo", "1.0", "0")));
    }

    #[test]
    fn test_deserialize_repodata_entry() {
        let json = r#"{
            "name": "numpy",
            "version": "1.26.4",
            "build": "py312h8753938_0",
            "build_number": 0,
            "depends": ["libblas >=3.9.0,<4.0a0", "python >=3.12,<3.13.0a0"],
            "constrains": ["numpy-base <0a0"],
            "md5": "b8d2ee2e4ba3ac3ef0ff8a0e2ed5a8fe",
            "size": 7048813,
            "subdir": "linux-64"
        }"#;
        let record: PackageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.name, "numpy");
        assert_eq!(record.depends.len(), 2);
        assert_eq!(record.depends[1].name(), "python");
        assert_eq!(record.constrains.len(), 1);
        assert_eq!(record.kind, RecordKind::Real);
        assert!(record.channel.is_empty());
    }

    #[test]
    fn test_serialize_skips_defaults() {
        let json = serde_json::to_value(record("foo", "1.0", "0")).unwrap();
        assert!(json.get("kind").is_none());
        assert!(json.get("md5").is_none());
        assert_eq!(json["version"], "1.0");

        let json = serde_json::to_value(record("__unix", "0", "0").with_kind(RecordKind::Virtual)).unwrap();
        assert_eq!(json["kind"], "virtual");
    }
}
