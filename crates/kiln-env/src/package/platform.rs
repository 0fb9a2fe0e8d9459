//! Target platforms (channel subdirs)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown platform \"{0}\"")]
pub struct ParsePlatformError(pub String);

/// A platform a channel publishes packages for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Platform {
    NoArch,
    Linux32,
    Linux64,
    LinuxAarch64,
    LinuxArmV6l,
    LinuxArmV7l,
    LinuxPpc64le,
    LinuxS390X,
    Osx64,
    OsxArm64,
    Win32,
    Win64,
    WinArm64,
}

impl Platform {
    /// All known platforms
    pub fn all() -> &'static [Platform] {
        &[
            Platform::NoArch,
            Platform::Linux32,
            Platform::Linux64,
            Platform::LinuxAarch64,
            Platform::LinuxArmV6l,
            Platform::LinuxArmV7l,
            Platform::LinuxPpc64le,
            Platform::LinuxS390X,
            Platform::Osx64,
            Platform::OsxArm64,
            Platform::Win32,
            Platform::Win64,
            Platform::WinArm64,
        ]
    }

    /// The platform this binary was compiled for
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            if cfg!(target_arch = "x86_64") {
                Platform::Linux64
            } else if cfg!(target_arch = "x86") {
                Platform::Linux32
            } else if cfg!(target_arch = "aarch64") {
                Platform::LinuxAarch64
            } else if cfg!(target_arch = "powerpc64") {
                Platform::LinuxPpc64le
            } else if cfg!(target_arch = "s390x") {
                Platform::LinuxS390X
            } else if cfg!(target_arch = "arm") {
                Platform::LinuxArmV7l
            } else {
                Platform::NoArch
            }
        } else if cfg!(target_os = "macos") {
            if cfg!(target_arch = "aarch64") {
                Platform::OsxArm64
            } else {
                Platform::Osx64
            }
        } else if cfg!(target_os = "windows") {
            if cfg!(target_arch = "aarch64") {
                Platform::WinArm64
            } else if cfg!(target_arch = "x86") {
                Platform::Win32
            } else {
                Platform::Win64
            }
        } else {
            Platform::NoArch
        }
    }

    /// The subdir name, e.g. `linux-64`
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::NoArch => "noarch",
            Platform::Linux32 => "linux-32",
            Platform::Linux64 => "linux-64",
            Platform::LinuxAarch64 => "linux-aarch64",
            Platform::LinuxArmV6l => "linux-armv6l",
            Platform::LinuxArmV7l => "linux-armv7l",
            Platform::LinuxPpc64le => "linux-ppc64le",
            Platform::LinuxS390X => "linux-s390x",
            Platform::Osx64 => "osx-64",
            Platform::OsxArm64 => "osx-arm64",
            Platform::Win32 => "win-32",
            Platform::Win64 => "win-64",
            Platform::WinArm64 => "win-arm64",
        }
    }

    pub fn is_linux(&self) -> bool {
        matches!(
            self,
            Platform::Linux32
                | Platform::Linux64
                | Platform::LinuxAarch64
                | Platform::LinuxArmV6l
                | Platform::LinuxArmV7l
                | Platform::LinuxPpc64le
                | Platform::LinuxS390X
        )
    }

    pub fn is_osx(&self) -> bool {
        matches!(self, Platform::Osx64 | Platform::OsxArm64)
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Platform::Win32 | Platform::Win64 | Platform::WinArm64)
    }

    pub fn is_unix(&self) -> bool {
        self.is_linux() || self.is_osx()
    }

    /// The CPU architecture name used as the `__archspec` build string
    pub fn arch(&self) -> Option<&'static str> {
        match self {
            Platform::NoArch => None,
            Platform::Linux32 | Platform::Win32 => Some("x86"),
            Platform::Linux64 | Platform::Osx64 | Platform::Win64 => Some("x86_64"),
            Platform::LinuxAarch64 => Some("aarch64"),
            Platform::OsxArm64 | Platform::WinArm64 => Some("arm64"),
            Platform::LinuxArmV6l => Some("armv6l"),
            Platform::LinuxArmV7l => Some("armv7l"),
            Platform::LinuxPpc64le => Some("ppc64le"),
            Platform::LinuxS390X => Some("s390x"),
        }
    }
}

impl FromStr for Platform {
    type Err = ParsePlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Platform::all()
            .iter()
            .copied()
            .find(|p| p.as_str() == lower)
            .ok_or_else(|| ParsePlatformError(s.to_string()))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Platform {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Platform {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for platform in Platform::all() {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), *platform);
        }
        assert_eq!(" Linux-64 ".parse::<Platform>().unwrap(), Platform::Linux64);
        assert!("beos-64".parse::<Platform>().is_err());
    }

    #[test]
    fn test_families() {
        assert!(Platform::Linux64.is_unix());
        assert!(Platform::OsxArm64.is_unix());
        assert!(!Platform::Win64.is_unix());
        assert!(Platform::Win64.is_windows());
        assert!(!Platform::NoArch.is_unix());
        assert_eq!(Platform::NoArch.arch(), None);
        assert_eq!(Platform::OsxArm64.arch(), Some("arm64"));
    }

    #[test]
    fn test_current_is_known() {
        let current = Platform::current();
        assert_eq!(current.as_str().parse::<Platform>().unwrap(), current);
    }
}
