//! Version spec parsing
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! spec := group ('|' group)*
//! group := atom (',' atom)*
//! atom := '(' spec ')' | term
//! term := '*' | [operator] version ['.*' | '*']
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::{Constraint, MultiConstraint, Operator};
use crate::{ParseVersionError, Version};

/// Error type for version spec parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseConstraintError {
    #[error("Empty version spec")]
    Empty,
    #[error("Empty term in version spec \"{0}\"")]
    EmptyTerm(String),
    #[error("Operator without version in \"{0}\"")]
    DanglingOperator(String),
    #[error("Unbalanced parentheses in version spec \"{0}\"")]
    UnbalancedParentheses(String),
    #[error("Invalid version in \"{term}\": {source}")]
    InvalidVersion {
        term: String,
        #[source]
        source: ParseVersionError,
    },
}

/// A parsed version spec, the version part of a match spec
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionSpec {
    /// Matches every version (`*`)
    Any,
    /// A single operator constraint
    Constraint(Constraint),
    /// An AND or OR group
    Multi(MultiConstraint),
}

impl VersionSpec {
    /// Check whether `version` satisfies this spec
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            VersionSpec::Any => true,
            VersionSpec::Constraint(c) => c.matches(version),
            VersionSpec::Multi(m) => m.matches(version),
        }
    }

    /// Returns true if this spec matches every version
    pub fn is_any(&self) -> bool {
        matches!(self, VersionSpec::Any)
    }
}

impl From<Constraint> for VersionSpec {
    fn from(constraint: Constraint) -> Self {
        VersionSpec::Constraint(constraint)
    }
}

struct Parser<'a> {
    source: &'a str,
    rest: &'a str,
}

impl<'a> Parser<'a> {
    fn parse_or(&mut self) -> Result<VersionSpec, ParseConstraintError> {
        let mut groups = vec![self.parse_and()?];
        while let Some(rest) = self.rest.strip_prefix('|') {
            self.rest = rest;
            groups.push(self.parse_and()?);
        }
        Ok(MultiConstraint::create(groups, false))
    }

    fn parse_and(&mut self) -> Result<VersionSpec, ParseConstraintError> {
        let mut atoms = vec![self.parse_atom()?];
        while let Some(rest) = self.rest.strip_prefix(',') {
            self.rest = rest;
            atoms.push(self.parse_atom()?);
        }
        Ok(MultiConstraint::create(atoms, true))
    }

    fn parse_atom(&mut self) -> Result<VersionSpec, ParseConstraintError> {
        self.rest = self.rest.trim_start();
        if let Some(rest) = self.rest.strip_prefix('(') {
            self.rest = rest;
            let inner = self.parse_or()?;
            self.rest = self
                .rest
                .trim_start()
                .strip_prefix(')')
                .ok_or_else(|| ParseConstraintError::UnbalancedParentheses(self.source.to_string()))?;
            self.rest = self.rest.trim_start();
            return Ok(inner);
        }

        let end = self.rest.find([',', '|', '(', ')']).unwrap_or(self.rest.len());
        let (term, rest) = self.rest.split_at(end);
        if rest.starts_with('(') {
            return Err(ParseConstraintError::UnbalancedParentheses(self.source.to_string()));
        }
        self.rest = rest;

        let term = term.trim();
        if term.is_empty() {
            return Err(ParseConstraintError::EmptyTerm(self.source.to_string()));
        }
        parse_term(term)
    }
}

fn parse_term(term: &str) -> Result<VersionSpec, ParseConstraintError> {
    if term == "*" {
        return Ok(VersionSpec::Any);
    }

    let operator = Operator::supported_operators()
        .iter()
        .find(|op| term.starts_with(**op))
        .copied();
    let rest = term[operator.map_or(0, str::len)..].trim();
    if rest.is_empty() {
        return Err(ParseConstraintError::DanglingOperator(term.to_string()));
    }

    let glob = rest.ends_with('*');
    let base = if glob {
        rest.trim_end_matches('*').trim_end_matches('.')
    } else {
        rest
    };

    let operator = match (operator, glob) {
        (None, false) | (Some("=="), false) => Operator::Equal,
        (None, true) | (Some("=="), true) | (Some("="), _) => Operator::StartsWith,
        (Some("!="), true) => Operator::NotStartsWith,
        (Some(op), _) => op
            .parse()
            .map_err(|_| ParseConstraintError::DanglingOperator(term.to_string()))?,
    };

    if base.is_empty() {
        // `=*`, `==*` and `>=*` are spelled-out wildcards
        return match operator {
            Operator::StartsWith | Operator::GreaterThanOrEqual => Ok(VersionSpec::Any),
            _ => Err(ParseConstraintError::DanglingOperator(term.to_string())),
        };
    }

    let version = base
        .parse::<Version>()
        .map_err(|source| ParseConstraintError::InvalidVersion {
            term: term.to_string(),
            source,
        })?;
    Ok(VersionSpec::Constraint(Constraint::new(operator, version)))
}

impl FromStr for VersionSpec {
    type Err = ParseConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let source = s.trim();
        if source.is_empty() {
            return Err(ParseConstraintError::Empty);
        }

        let mut parser = Parser { source, rest: source };
        let spec = parser.parse_or()?;
        if !parser.rest.trim().is_empty() {
            return Err(ParseConstraintError::UnbalancedParentheses(source.to_string()));
        }
        Ok(spec)
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Any => f.write_str("*"),
            VersionSpec::Constraint(c) => write!(f, "{}", c),
            VersionSpec::Multi(m) => write!(f, "{}", m),
        }
    }
}

impl Serialize for VersionSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
