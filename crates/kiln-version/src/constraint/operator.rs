//! Operator types for version constraints

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Comparison operators for version constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Equal (==)
    Equal,
    /// Not equal (!=)
    NotEqual,
    /// Less than (<)
    LessThan,
    /// Less than or equal (<=)
    LessThanOrEqual,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal (>=)
    GreaterThanOrEqual,
    /// Prefix match (=1.2, 1.2.*)
    StartsWith,
    /// Negated prefix match (!=1.2.*)
    NotStartsWith,
    /// Compatible release (~=)
    Compatible,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid operator: {0}")]
pub struct InvalidOperatorError(pub String);

impl Operator {
    /// Get the string representation of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::StartsWith => "=",
            Operator::NotStartsWith => "!=",
            Operator::Compatible => "~=",
        }
    }

    /// Operator prefixes, longest first so that `>=` is tried before `>`
    pub fn supported_operators() -> &'static [&'static str] {
        &["==", "!=", "<=", ">=", "~=", "<", ">", "="]
    }

    /// Returns the operator that matches exactly the versions this one rejects
    pub fn negate(&self) -> Self {
        match self {
            Operator::Equal => Operator::NotEqual,
            Operator::NotEqual => Operator::Equal,
            Operator::LessThan => Operator::GreaterThanOrEqual,
            Operator::LessThanOrEqual => Operator::GreaterThan,
            Operator::GreaterThan => Operator::LessThanOrEqual,
            Operator::GreaterThanOrEqual => Operator::LessThan,
            Operator::StartsWith => Operator::NotStartsWith,
            Operator::NotStartsWith => Operator::StartsWith,
            // `~=` has no single-operator complement
            Operator::Compatible => Operator::Compatible,
        }
    }
}

impl FromStr for Operator {
    type Err = InvalidOperatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" => Ok(Operator::Equal),
            "!=" => Ok(Operator::NotEqual),
            "<" => Ok(Operator::LessThan),
            "<=" => Ok(Operator::LessThanOrEqual),
            ">" => Ok(Operator::GreaterThan),
            ">=" => Ok(Operator::GreaterThanOrEqual),
            "=" => Ok(Operator::StartsWith),
            "~=" => Ok(Operator::Compatible),
            _ => Err(InvalidOperatorError(s.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("==".parse::<Operator>().unwrap(), Operator::Equal);
        assert_eq!(">=".parse::<Operator>().unwrap(), Operator::GreaterThanOrEqual);
        assert_eq!("=".parse::<Operator>().unwrap(), Operator::StartsWith);
        assert_eq!("~=".parse::<Operator>().unwrap(), Operator::Compatible);
        assert!("<>".parse::<Operator>().is_err());
    }

    #[test]
    fn test_supported_operators_longest_first() {
        let ops = Operator::supported_operators();
        for (i, op) in ops.iter().enumerate() {
            for longer in &ops[i + 1..] {
                assert!(!longer.starts_with(op), "{} must come after {}", op, longer);
            }
        }
    }

    #[test]
    fn test_negate() {
        assert_eq!(Operator::LessThan.negate(), Operator::GreaterThanOrEqual);
        assert_eq!(Operator::StartsWith.negate(), Operator::NotStartsWith);
        assert_eq!(Operator::Equal.negate().negate(), Operator::Equal);
    }
}
