//! Match specs: textual constraints selecting package records
//!
//! Accepted forms:
//!
//! ```text
//! numpy
//! numpy 1.26
//! numpy 1.26.* py312*
//! numpy=1.26=py312*
//! numpy>=1.20,<2
//! conda-forge::numpy ==1.26.4
//! conda-forge/linux-64::numpy
//! numpy[version='>=1.20,<2', build=py312*, build_number='>=1']
//! ```

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use kiln_version::{
    BuildNumberSpec, ParseBuildNumberSpecError, ParseConstraintError, ParseStringMatcherError, StringMatcher,
    VersionSpec,
};

use super::{PackageRecord, Platform};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseMatchSpecError {
    #[error("Empty match spec")]
    Empty,
    #[error("Invalid package name in \"{0}\"")]
    InvalidName(String),
    #[error("Unclosed bracket in \"{0}\"")]
    UnclosedBracket(String),
    #[error("Invalid bracket expression \"{0}\"")]
    InvalidBracket(String),
    #[error("Unknown bracket key \"{0}\"")]
    UnknownKey(String),
    #[error("Too many parts in \"{0}\", expected `name [version [build]]`")]
    TooManyParts(String),
    #[error("Invalid version spec in \"{spec}\": {source}")]
    InvalidVersion {
        spec: String,
        #[source]
        source: ParseConstraintError,
    },
    #[error("Invalid build string in \"{spec}\": {source}")]
    InvalidBuild {
        spec: String,
        #[source]
        source: ParseStringMatcherError,
    },
    #[error("Invalid build number in \"{spec}\": {source}")]
    InvalidBuildNumber {
        spec: String,
        #[source]
        source: ParseBuildNumberSpecError,
    },
}

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r"(?i-u)^[a-z0-9_.\-]+").unwrap();
    static ref EXACT_BUILD_RE: Regex = Regex::new(r"^=([^=<>!~,|()\s]+)=([^=\s]+)$").unwrap();
    static ref OP_SPACE_RE: Regex = Regex::new(r"([<>=!~(])\s+").unwrap();
    static ref CLOSE_SPACE_RE: Regex = Regex::new(r"\s+\)").unwrap();
    static ref SEP_SPACE_RE: Regex = Regex::new(r"\s*([,|])\s*").unwrap();
}

/// A parsed match spec
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchSpec {
    name: String,
    version: Option<VersionSpec>,
    build: Option<StringMatcher>,
    build_number: Option<BuildNumberSpec>,
    channel: Option<String>,
    subdir: Option<String>,
}

impl MatchSpec {
    /// A spec matching every record of `name`
    pub fn from_name(name: &str) -> Self {
        MatchSpec {
            name: name.trim().to_lowercase(),
            version: None,
            build: None,
            build_number: None,
            channel: None,
            subdir: None,
        }
    }

    /// The lowercased package name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&VersionSpec> {
        self.version.as_ref()
    }

    pub fn build(&self) -> Option<&StringMatcher> {
        self.build.as_ref()
    }

    pub fn build_number(&self) -> Option<&BuildNumberSpec> {
        self.build_number.as_ref()
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn subdir(&self) -> Option<&str> {
        self.subdir.as_deref()
    }

    /// Returns true if the spec only constrains the name
    pub fn is_name_only(&self) -> bool {
        self.version.is_none()
            && self.build.is_none()
            && self.build_number.is_none()
            && self.channel.is_none()
            && self.subdir.is_none()
    }

    /// Check whether `record` satisfies every part of this spec
    pub fn matches(&self, record: &PackageRecord) -> bool {
        if !self.name.eq_ignore_ascii_case(&record.name) {
            return false;
        }

        if let Some(channel) = &self.channel {
            if !channel_matches(channel, &record.channel) {
                return false;
            }
        }

        if let Some(subdir) = &self.subdir {
            if !subdir.eq_ignore_ascii_case(&record.subdir) {
                return false;
            }
        }

        if let Some(version) = &self.version {
            if !version.matches(&record.version) {
                return false;
            }
        }

        if let Some(build) = &self.build {
            if !build.matches(&record.build) {
                return false;
            }
        }

        if let Some(build_number) = &self.build_number {
            if !build_number.matches(record.build_number) {
                return false;
            }
        }

        true
    }
}

/// A spec channel matches the record channel by canonical name, or as the
/// trailing path of a record channel URL
fn channel_matches(spec_channel: &str, record_channel: &str) -> bool {
    let spec_channel = spec_channel.trim_end_matches('/').to_lowercase();
    let record_channel = record_channel.trim_end_matches('/').to_lowercase();
    record_channel == spec_channel || record_channel.ends_with(&format!("/{}", spec_channel))
}

/// Split the contents of `[...]` into key/value pairs, honouring quotes
fn parse_brackets(content: &str, spec: &str) -> Result<Vec<(String, String)>, ParseMatchSpecError> {
    let mut pairs = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut parts = Vec::new();

    for c in content.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => quote = Some(c),
            (None, ',') => parts.push(std::mem::take(&mut current)),
            (None, c) => current.push(c),
        }
    }
    if quote.is_some() {
        return Err(ParseMatchSpecError::InvalidBracket(spec.to_string()));
    }
    parts.push(current);

    for part in parts {
        if part.trim().is_empty() {
            continue;
        }
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| ParseMatchSpecError::InvalidBracket(spec.to_string()))?;
        pairs.push((key.trim().to_lowercase(), value.trim().to_string()));
    }
    Ok(pairs)
}

fn parse_version(text: &str, spec: &str) -> Result<Option<VersionSpec>, ParseMatchSpecError> {
    let version: VersionSpec = text.parse().map_err(|source| ParseMatchSpecError::InvalidVersion {
        spec: spec.to_string(),
        source,
    })?;
    Ok((!version.is_any()).then_some(version))
}

fn parse_build(text: &str, spec: &str) -> Result<Option<StringMatcher>, ParseMatchSpecError> {
    let build: StringMatcher = text.parse().map_err(|source| ParseMatchSpecError::InvalidBuild {
        spec: spec.to_string(),
        source,
    })?;
    Ok((!build.is_wildcard()).then_some(build))
}

impl FromStr for MatchSpec {
    type Err = ParseMatchSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim();
        if spec.is_empty() {
            return Err(ParseMatchSpecError::Empty);
        }

        // 1. Bracket section
        let (head, brackets) = match spec.find('[') {
            Some(start) => {
                let content = spec[start + 1..]
                    .strip_suffix(']')
                    .ok_or_else(|| ParseMatchSpecError::UnclosedBracket(spec.to_string()))?;
                (&spec[..start], parse_brackets(content, spec)?)
            }
            None => (spec, Vec::new()),
        };

        // 2. Channel and subdir prefix
        let (channel, subdir, rest) = match head.rsplit_once("::") {
            Some((prefix, rest)) => {
                let prefix = prefix.trim().trim_end_matches('/');
                match prefix.rsplit_once('/') {
                    Some((channel, subdir)) if subdir.parse::<Platform>().is_ok() => {
                        (Some(channel.to_string()), Some(subdir.to_lowercase()), rest)
                    }
                    _ => (Some(prefix.to_string()), None, rest),
                }
            }
            None => (None, None, head),
        };
        let channel = channel.filter(|c| !c.is_empty());

        // 3. Name, ASCII only
        let rest = rest.trim();
        let name_len = NAME_RE.find(rest).map_or(0, |m| m.end());
        if name_len == 0 {
            return Err(ParseMatchSpecError::InvalidName(spec.to_string()));
        }
        let name = rest[..name_len].to_ascii_lowercase();

        // 4. Positional version and build
        let remainder = SEP_SPACE_RE.replace_all(&rest[name_len..], "$1");
        let remainder = OP_SPACE_RE.replace_all(&remainder, "$1");
        let remainder = CLOSE_SPACE_RE.replace_all(&remainder, ")");
        let mut parts: Vec<&str> = remainder.split_whitespace().collect();
        // `name=version=build` pins the version exactly
        if let &[single] = parts.as_slice() {
            if let Some(captures) = EXACT_BUILD_RE.captures(single) {
                if let (Some(version), Some(build)) = (captures.get(1), captures.get(2)) {
                    parts = vec![version.as_str(), build.as_str()];
                }
            }
        }
        if parts.len() > 2 {
            return Err(ParseMatchSpecError::TooManyParts(spec.to_string()));
        }

        let mut match_spec = MatchSpec {
            name,
            version: None,
            build: None,
            build_number: None,
            channel,
            subdir,
        };
        if let Some(version) = parts.first() {
            match_spec.version = parse_version(version, spec)?;
        }
        if let Some(build) = parts.get(1) {
            match_spec.build = parse_build(build, spec)?;
        }

        // 5. Bracket keys override positional parts
        for (key, value) in brackets {
            match key.as_str() {
                "version" => match_spec.version = parse_version(&value, spec)?,
                "build" => match_spec.build = parse_build(&value, spec)?,
                "build_number" => {
                    let number: BuildNumberSpec = value
                        .parse()
                        .map_err(|source| ParseMatchSpecError::InvalidBuildNumber {
                            spec: spec.to_string(),
                            source,
                        })?;
                    match_spec.build_number = Some(number);
                }
                "channel" => match_spec.channel = Some(value.trim_end_matches('/').to_string()),
                "subdir" => match_spec.subdir = Some(value.to_lowercase()),
                _ => return Err(ParseMatchSpecError::UnknownKey(key)),
            }
        }

        Ok(match_spec)
    }
}

impl fmt::Display for MatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(channel) = &self.channel {
            f.write_str(channel)?;
            if let Some(subdir) = &self.subdir {
                write!(f, "/{}", subdir)?;
            }
            f.write_str("::")?;
        }

        f.write_str(&self.name)?;

        match (&self.version, &self.build) {
            (Some(version), Some(build)) => write!(f, " {} {}", version, build)?,
            (Some(version), None) => write!(f, " {}", version)?,
            (None, Some(build)) => write!(f, " * {}", build)?,
            (None, None) => {}
        }

        let mut keys = Vec::new();
        if let Some(build_number) = &self.build_number {
            keys.push(format!("build_number='{}'", build_number));
        }
        if self.channel.is_none() {
            if let Some(subdir) = &self.subdir {
                keys.push(format!("subdir={}", subdir));
            }
        }
        if !keys.is_empty() {
            write!(f, "[{}]", keys.join(", "))?;
        }
        Ok(())
    }
}

impl Serialize for MatchSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MatchSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
