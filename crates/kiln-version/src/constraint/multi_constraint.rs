//! MultiConstraint - compound constraint combining multiple version specs

use std::fmt;

use super::VersionSpec;
use crate::Version;

/// A group of version specs combined with AND (conjunctive, `,`) or OR
/// (disjunctive, `|`) logic
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MultiConstraint {
    constraints: Vec<VersionSpec>,
    conjunctive: bool,
}

impl MultiConstraint {
    /// Create a new MultiConstraint
    pub fn new(constraints: Vec<VersionSpec>, conjunctive: bool) -> Self {
        MultiConstraint {
            constraints,
            conjunctive,
        }
    }

    /// Combine `constraints`, collapsing a single member into itself
    pub fn create(mut constraints: Vec<VersionSpec>, conjunctive: bool) -> VersionSpec {
        if conjunctive {
            constraints.retain(|c| !matches!(c, VersionSpec::Any));
        } else if constraints.iter().any(|c| matches!(c, VersionSpec::Any)) {
            return VersionSpec::Any;
        }

        match constraints.len() {
            0 => VersionSpec::Any,
            1 => constraints.remove(0),
            _ => VersionSpec::Multi(MultiConstraint::new(constraints, conjunctive)),
        }
    }

    /// Get the member constraints
    pub fn constraints(&self) -> &[VersionSpec] {
        &self.constraints
    }

    /// Returns true for AND groups
    pub fn is_conjunctive(&self) -> bool {
        self.conjunctive
    }

    /// Returns true for OR groups
    pub fn is_disjunctive(&self) -> bool {
        !self.conjunctive
    }

    /// Check whether `version` satisfies the group
    pub fn matches(&self, version: &Version) -> bool {
        if self.conjunctive {
            self.constraints.iter().all(|c| c.matches(version))
        } else {
            self.constraints.iter().any(|c| c.matches(version))
        }
    }
}

impl fmt::Display for MultiConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = if self.conjunctive { "," } else { "|" };
        for (i, constraint) in self.constraints.iter().enumerate() {
            if i > 0 {
                f.write_str(separator)?;
            }
            // An OR group nested inside an AND group needs parentheses
            match constraint {
                VersionSpec::Multi(inner) if self.conjunctive && inner.is_disjunctive() => {
                    write!(f, "({})", inner)?
                }
                other => write!(f, "{}", other)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(s: &str) -> VersionSpec {
        s.parse().unwrap()
    }

    #[test]
    fn test_create_collapses() {
        assert_eq!(MultiConstraint::create(vec![], true), VersionSpec::Any);
        assert_eq!(MultiConstraint::create(vec![spec(">=1")], true), spec(">=1"));
        assert_eq!(
            MultiConstraint::create(vec![VersionSpec::Any, spec(">=1")], true),
            spec(">=1")
        );
        assert_eq!(
            MultiConstraint::create(vec![VersionSpec::Any, spec(">=1")], false),
            VersionSpec::Any
        );
    }

    #[test]
    fn test_conjunctive_and_disjunctive() {
        let and = MultiConstraint::new(vec![spec(">=1"), spec("<2")], true);
        let or = MultiConstraint::new(vec![spec("<1"), spec(">=2")], false);
        let v: Version = "1.5".parse().unwrap();

        assert!(and.matches(&v));
        assert!(!or.matches(&v));
        assert_eq!(and.to_string(), ">=1,<2");
        assert_eq!(or.to_string(), "<1|>=2");
    }
}
