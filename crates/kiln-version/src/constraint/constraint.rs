//! Single operator constraint

use std::fmt;

use super::Operator;
use crate::Version;

/// A single version constraint such as `>=1.2` or `1.2.*`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constraint {
    operator: Operator,
    version: Version,
}

impl Constraint {
    /// Create a new constraint
    pub fn new(operator: Operator, version: Version) -> Self {
        Constraint { operator, version }
    }

    /// Get the operator
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Get the version operand
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Check whether `version` satisfies this constraint
    pub fn matches(&self, version: &Version) -> bool {
        match self.operator {
            Operator::Equal => version == &self.version,
            Operator::NotEqual => version != &self.version,
            Operator::LessThan => version < &self.version,
            Operator::LessThanOrEqual => version <= &self.version,
            Operator::GreaterThan => version > &self.version,
            Operator::GreaterThanOrEqual => version >= &self.version,
            Operator::StartsWith => version.starts_with(&self.version),
            Operator::NotStartsWith => !version.starts_with(&self.version),
            Operator::Compatible => version.is_compatible_with(&self.version),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            Operator::StartsWith => write!(f, "{}.*", self.version),
            Operator::NotStartsWith => write!(f, "!={}.*", self.version),
            op => write!(f, "{}{}", op, self.version),
        }
    }
}
