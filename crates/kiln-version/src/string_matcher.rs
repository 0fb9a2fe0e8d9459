//! Build string matching: exact text, `*` globs or `^...$` regular expressions

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseStringMatcherError {
    #[error("Empty string pattern")]
    Empty,
    #[error("Invalid string pattern \"{pattern}\": {reason}")]
    InvalidRegex { pattern: String, reason: String },
}

/// Matches strings such as build strings against a pattern
#[derive(Debug, Clone)]
pub enum StringMatcher {
    Exact(String),
    /// A pattern containing `*`, compiled to an anchored regex
    Glob { pattern: String, regex: Regex },
    /// A user-supplied regex written as `^...$`
    Regex { pattern: String, regex: Regex },
}

impl StringMatcher {
    /// Check whether `value` matches
    pub fn matches(&self, value: &str) -> bool {
        match self {
            StringMatcher::Exact(s) => s == value,
            StringMatcher::Glob { regex, .. } | StringMatcher::Regex { regex, .. } => regex.is_match(value),
        }
    }

    /// The pattern this matcher was parsed from
    pub fn as_str(&self) -> &str {
        match self {
            StringMatcher::Exact(s) => s,
            StringMatcher::Glob { pattern, .. } | StringMatcher::Regex { pattern, .. } => pattern,
        }
    }

    /// Returns true if the pattern is the bare wildcard `*`
    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl FromStr for StringMatcher {
    type Err = ParseStringMatcherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pattern = s.trim();
        if pattern.is_empty() {
            return Err(ParseStringMatcherError::Empty);
        }

        let invalid = |e: regex::Error| ParseStringMatcherError::InvalidRegex {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        };

        if pattern.starts_with('^') && pattern.ends_with('$') {
            let regex = Regex::new(pattern).map_err(invalid)?;
            return Ok(StringMatcher::Regex {
                pattern: pattern.to_string(),
                regex,
            });
        }

        if pattern.contains('*') {
            let body = pattern
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*");
            let regex = Regex::new(&format!("^{}$", body)).map_err(invalid)?;
            return Ok(StringMatcher::Glob {
                pattern: pattern.to_string(),
                regex,
            });
        }

        Ok(StringMatcher::Exact(pattern.to_string()))
    }
}

impl PartialEq for StringMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for StringMatcher {}

impl Hash for StringMatcher {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl fmt::Display for StringMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StringMatcher {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StringMatcher {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(s: &str) -> StringMatcher {
        s.parse().unwrap()
    }

    #[test]
    fn test_exact() {
        assert!(m("py39_0").matches("py39_0"));
        assert!(!m("py39_0").matches("py39_1"));
        assert!(matches!(m("py39_0"), StringMatcher::Exact(_)));
    }

    #[test]
    fn test_glob() {
        assert!(m("py*").matches("py39_0"));
        assert!(m("*_0").matches("py39_0"));
        assert!(m("*cuda*").matches("py39_cuda112_0"));
        assert!(!m("py*").matches("np1_py39"));
        assert!(m("*").is_wildcard());
        // Regex metacharacters in globs are literal
        assert!(m("a.b*").matches("a.bc"));
        assert!(!m("a.b*").matches("axbc"));
    }

    #[test]
    fn test_regex() {
        assert!(m("^py3[0-9]+_.*$").matches("py310_0"));
        assert!(!m("^py3[0-9]+_.*$").matches("py2_0"));
        assert!(matches!("^(unclosed$".parse::<StringMatcher>(), Err(ParseStringMatcherError::InvalidRegex { .. })));
    }

    #[test]
    fn test_eq_by_pattern() {
        assert_eq!(m("py*"), m(" py* "));
        assert_ne!(m("py*"), m("py"));
        assert_eq!(m("py*").to_string(), "py*");
    }
}
