//! Build number constraints (`build_number=">=2"`)

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::Operator;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseBuildNumberSpecError {
    #[error("Empty build number spec")]
    Empty,
    #[error("Invalid build number spec \"{0}\"")]
    Invalid(String),
}

/// A constraint on a record's build number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuildNumberSpec {
    operator: Operator,
    number: u64,
}

impl BuildNumberSpec {
    pub fn new(operator: Operator, number: u64) -> Self {
        BuildNumberSpec { operator, number }
    }

    /// Check whether `build_number` satisfies this spec
    pub fn matches(&self, build_number: u64) -> bool {
        match self.operator {
            Operator::Equal | Operator::StartsWith | Operator::Compatible => build_number == self.number,
            Operator::NotEqual | Operator::NotStartsWith => build_number != self.number,
            Operator::LessThan => build_number < self.number,
            Operator::LessThanOrEqual => build_number <= self.number,
            Operator::GreaterThan => build_number > self.number,
            Operator::GreaterThanOrEqual => build_number >= self.number,
        }
    }
}

impl FromStr for BuildNumberSpec {
    type Err = ParseBuildNumberSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseBuildNumberSpecError::Empty);
        }

        let op = ["==", "!=", "<=", ">=", "<", ">", "="]
            .iter()
            .find(|op| s.starts_with(**op))
            .copied();
        let operator = match op {
            None | Some("=") | Some("==") => Operator::Equal,
            Some(op) => op
                .parse()
                .map_err(|_| ParseBuildNumberSpecError::Invalid(s.to_string()))?,
        };

        let number = s[op.map_or(0, str::len)..]
            .trim()
            .parse::<u64>()
            .map_err(|_| ParseBuildNumberSpecError::Invalid(s.to_string()))?;
        Ok(BuildNumberSpec { operator, number })
    }
}

impl fmt::Display for BuildNumberSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            Operator::Equal => write!(f, "{}", self.number),
            op => write!(f, "{}{}", op, self.number),
        }
    }
}
