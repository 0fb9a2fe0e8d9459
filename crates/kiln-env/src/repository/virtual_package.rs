//! Virtual packages describing host capabilities (`__glibc`, `__osx`, ...)
//!
//! They are injected into the index as ordinary records so that real
//! packages can depend on them.

use std::fmt;
use std::process::Command;
use std::str::FromStr;

use indexmap::IndexMap;
use thiserror::Error;

use kiln_version::{ParseVersionError, Version};

use crate::package::{PackageRecord, Platform, RecordKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseVirtualPackageError {
    #[error("Empty virtual package")]
    Empty,
    #[error("Virtual package \"{0}\" must start with \"__\"")]
    MissingPrefix(String),
    #[error("Invalid version for virtual package \"{name}\": {source}")]
    InvalidVersion {
        name: String,
        #[source]
        source: ParseVersionError,
    },
}

/// A host capability: name, version and build string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualPackage {
    pub name: String,
    pub version: Version,
    pub build: String,
}

const CANONICAL_GLIBC: &str = "2.17";
const DEFAULT_BUILD: &str = "0";

impl VirtualPackage {
    pub fn new(name: impl Into<String>, version: Version, build: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version,
            build: build.into(),
        }
    }

    fn zero(name: &str) -> Self {
        Self::new(name, Version::zero(), DEFAULT_BUILD)
    }

    /// Convert to a record tagged as virtual
    pub fn to_record(&self) -> PackageRecord {
        PackageRecord::new(&self.name, self.version.clone(), &self.build).with_kind(RecordKind::Virtual)
    }

    /// Virtual packages for `platform`, or for the host when `None`.
    ///
    /// With a platform given the canonical set for it is returned without
    /// looking at the machine. `overrides` maps names without the `__`
    /// prefix (`glibc`, `osx`, `linux`, `cuda`) to versions; `archspec`
    /// replaces the CPU architecture build string.
    pub fn detect(platform: Option<Platform>, overrides: &IndexMap<String, String>) -> Vec<VirtualPackage> {
        let mut packages = match platform {
            Some(platform) => Self::canonical(platform),
            None => Self::detect_host(Platform::current()),
        };
        Self::apply_overrides(&mut packages, overrides);
        log::debug!(
            "Virtual packages: {}",
            packages.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
        );
        packages
    }

    /// The set a machine of `platform` is assumed to provide
    pub fn canonical(platform: Platform) -> Vec<VirtualPackage> {
        Self::build_set(platform, |name| match name {
            "__linux" => Version::zero(),
            "__glibc" => parse_or_zero(CANONICAL_GLIBC),
            "__osx" if platform == Platform::OsxArm64 => parse_or_zero("11.0"),
            "__osx" => parse_or_zero("10.15"),
            _ => Version::zero(),
        })
    }

    fn detect_host(platform: Platform) -> Vec<VirtualPackage> {
        let canonical = Self::canonical(platform);
        Self::build_set(platform, |name| {
            let detected = match name {
                "__linux" => detect_linux_kernel(),
                "__glibc" => detect_glibc(),
                "__osx" => detect_osx(),
                _ => return Version::zero(),
            };
            detected.unwrap_or_else(|| {
                let fallback = canonical
                    .iter()
                    .find(|p| p.name == name)
                    .map(|p| p.version.clone())
                    .unwrap_or_else(Version::zero);
                log::warn!("Could not detect {} version, assuming {}", name, fallback);
                fallback
            })
        })
    }

    fn build_set(platform: Platform, mut version_of: impl FnMut(&str) -> Version) -> Vec<VirtualPackage> {
        let mut packages = Vec::new();
        if platform.is_unix() {
            packages.push(Self::zero("__unix"));
        }
        if platform.is_linux() {
            packages.push(Self::new("__linux", version_of("__linux"), DEFAULT_BUILD));
            packages.push(Self::new("__glibc", version_of("__glibc"), DEFAULT_BUILD));
        }
        if platform.is_osx() {
            packages.push(Self::new("__osx", version_of("__osx"), DEFAULT_BUILD));
        }
        if platform.is_windows() {
            packages.push(Self::zero("__win"));
        }
        if let Some(arch) = platform.arch() {
            packages.push(Self::new("__archspec", Version::one(), arch));
        }
        packages
    }

    fn apply_overrides(packages: &mut Vec<VirtualPackage>, overrides: &IndexMap<String, String>) {
        for (key, value) in overrides {
            let key = key.trim_start_matches("__").to_lowercase();
            let name = format!("__{}", key);

            if key == "archspec" {
                if let Some(package) = packages.iter_mut().find(|p| p.name == name) {
                    package.build = value.clone();
                }
                continue;
            }

            let version = match value.parse::<Version>() {
                Ok(version) => version,
                Err(e) => {
                    log::warn!("Ignoring override {}={}: {}", name, value, e);
                    continue;
                }
            };

            match packages.iter_mut().find(|p| p.name == name) {
                Some(package) => package.version = version,
                None if key == "cuda" => packages.push(Self::new(name, version, DEFAULT_BUILD)),
                None => log::debug!("Override for {} does not apply to this platform", name),
            }
        }
    }

    /// Merge caller-supplied packages into `base`, replacing by name
    pub fn merge(base: &mut Vec<VirtualPackage>, extra: &[VirtualPackage]) {
        for package in extra {
            match base.iter_mut().find(|p| p.name.eq_ignore_ascii_case(&package.name)) {
                Some(existing) => *existing = package.clone(),
                None => base.push(package.clone()),
            }
        }
    }
}

fn parse_or_zero(text: &str) -> Version {
    text.parse().unwrap_or_else(|_| Version::zero())
}

/// Leading `digits.digits...` of `text`, e.g. `6.1.0` from `6.1.0-13-amd64`
fn leading_version(text: &str) -> Option<Version> {
    let end = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let numeric = text[..end].trim_end_matches('.');
    if numeric.is_empty() {
        return None;
    }
    numeric.parse().ok()
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}

fn detect_linux_kernel() -> Option<Version> {
    let release = std::fs::read_to_string("/proc/sys/kernel/osrelease").ok()?;
    leading_version(release.trim())
}

fn detect_glibc() -> Option<Version> {
    let output = command_output("ldd", &["--version"])?;
    parse_ldd_version(&output)
}

/// Version from the first line of `ldd --version`, e.g. `ldd (GNU libc) 2.35`
fn parse_ldd_version(output: &str) -> Option<Version> {
    let first_line = output.lines().next()?;
    let last = first_line.split_whitespace().last()?;
    leading_version(last)
}

fn detect_osx() -> Option<Version> {
    let output = command_output("sw_vers", &["-productVersion"])?;
    leading_version(output.trim())
}

impl FromStr for VirtualPackage {
    type Err = ParseVirtualPackageError;

    /// Parses `__name[=version[=build]]`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseVirtualPackageError::Empty);
        }

        let mut parts = s.splitn(3, '=');
        let name = parts.next().unwrap_or_default().trim().to_lowercase();
        if !name.starts_with("__") || name.len() <= 2 {
            return Err(ParseVirtualPackageError::MissingPrefix(s.to_string()));
        }

        let version = match parts.next().map(str::trim).filter(|v| !v.is_empty()) {
            Some(text) => text
                .parse()
                .map_err(|source| ParseVirtualPackageError::InvalidVersion {
                    name: name.clone(),
                    source,
                })?,
            None => Version::zero(),
        };
        let build = parts
            .next()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(DEFAULT_BUILD)
            .to_string();

        Ok(Self { name, version, build })
    }
}

impl fmt::Display for VirtualPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}={}", self.name, self.version, self.build)
    }
}
