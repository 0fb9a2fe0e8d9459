//! Version type and its total order

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single component of a version segment.
///
/// The variant order is the comparison order: `dev` sorts below every other
/// identifier, identifiers sort below numbers, and `post` sorts above all.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Component {
    /// The `dev` marker
    Dev,
    /// Any other alphabetic run, lowercased (`a`, `alpha`, `rc`, ...)
    Iden(String),
    /// A run of digits
    Numeric(u64),
    /// The `post` marker
    Post,
}

impl Component {
    pub(crate) fn from_alpha(run: &str) -> Self {
        match run {
            "dev" => Component::Dev,
            "post" => Component::Post,
            other => Component::Iden(other.to_string()),
        }
    }

    /// Returns true if this is a numeric component
    pub fn is_numeric(&self) -> bool {
        matches!(self, Component::Numeric(_))
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Dev => write!(f, "dev"),
            Component::Iden(s) => write!(f, "{}", s),
            Component::Numeric(n) => write!(f, "{}", n),
            Component::Post => write!(f, "post"),
        }
    }
}

/// A segment is the part of a version between two separators, e.g. `0a1`.
pub type Segment = Vec<Component>;

const ZERO: Component = Component::Numeric(0);

/// A parsed package version.
///
/// Versions are immutable once parsed. The original text is kept for display,
/// while comparison, equality and hashing operate on the parsed form, so
/// `1.0` and `1.0.0` are equal.
#[derive(Debug, Clone)]
pub struct Version {
    pub(crate) source: String,
    pub(crate) epoch: u64,
    pub(crate) segments: Vec<Segment>,
    pub(crate) local: Vec<Segment>,
}

impl Version {
    /// A single-segment numeric version such as `0` or `1`
    pub fn from_number(number: u64) -> Self {
        Version {
            source: number.to_string(),
            epoch: 0,
            segments: vec![vec![Component::Numeric(number)]],
            local: Vec::new(),
        }
    }

    pub fn zero() -> Self {
        Self::from_number(0)
    }

    pub fn one() -> Self {
        Self::from_number(1)
    }

    /// The epoch (`N!` prefix), 0 when absent
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The release segments
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The local segments (after `+`)
    pub fn local(&self) -> &[Segment] {
        &self.local
    }

    /// The text this version was parsed from
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true if any release component is the `dev` marker
    pub fn is_dev(&self) -> bool {
        self.segments.iter().flatten().any(|c| *c == Component::Dev)
    }

    /// Check whether this version starts with `prefix`, segment by segment.
    ///
    /// All but the last prefix segment must be equal; the last prefix segment
    /// must be a component-wise prefix of the corresponding segment. Missing
    /// segments count as zero, so `1` starts with `1.0`.
    pub fn starts_with(&self, prefix: &Version) -> bool {
        if self.epoch != prefix.epoch {
            return false;
        }

        let last = prefix.segments.len().saturating_sub(1);
        for (i, expected) in prefix.segments.iter().enumerate() {
            let actual = self.segments.get(i).map(Vec::as_slice).unwrap_or(&[]);
            if i == last {
                let is_prefix = expected
                    .iter()
                    .enumerate()
                    .all(|(j, c)| actual.get(j).unwrap_or(&ZERO) == c);
                if !is_prefix {
                    return false;
                }
            } else if compare_segment(actual, expected) != Ordering::Equal {
                return false;
            }
        }

        prefix.local.is_empty() || compare_segments(&self.local, &prefix.local) == Ordering::Equal
    }

    /// Check the `~=` compatible-release relation: at least `base`, and
    /// starting with `base` minus its last segment.
    pub fn is_compatible_with(&self, base: &Version) -> bool {
        if self < base {
            return false;
        }
        if base.segments.len() < 2 {
            return true;
        }

        let mut prefix = base.clone();
        prefix.segments.pop();
        prefix.local.clear();
        self.starts_with(&prefix)
    }

    fn canonical(segments: &[Segment]) -> Vec<&[Component]> {
        let mut trimmed: Vec<&[Component]> = segments
            .iter()
            .map(|segment| {
                let mut end = segment.len();
                while end > 0 && segment[end - 1] == ZERO {
                    end -= 1;
                }
                &segment[..end]
            })
            .collect();
        while trimmed.last().is_some_and(|s| s.is_empty()) {
            trimmed.pop();
        }
        trimmed
    }
}

fn compare_segment(a: &[Component], b: &[Component]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let ordering = a.get(i).unwrap_or(&ZERO).cmp(b.get(i).unwrap_or(&ZERO));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_segments(a: &[Segment], b: &[Segment]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let sa = a.get(i).map(Vec::as_slice).unwrap_or(&[]);
        let sb = b.get(i).map(Vec::as_slice).unwrap_or(&[]);
        let ordering = compare_segment(sa, sb);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| compare_segments(&self.segments, &other.segments))
            .then_with(|| compare_segments(&self.local, &other.local))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.epoch.hash(state);
        Self::canonical(&self.segments).hash(state);
        Self::canonical(&self.local).hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
