//! Explanations for unsatisfiable requests

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::package::{MatchSpec, PackageRecord};

/// Who put a constraint on a name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintOrigin {
    /// Part of the request (or kept from the installed state)
    Requested,
    /// A dependency of the displayed record
    Package(String),
}

impl fmt::Display for ConstraintOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintOrigin::Requested => f.write_str("requested"),
            ConstraintOrigin::Package(record) => write!(f, "required by {}", record),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// The name must be part of the solution
    Requires,
    /// The name is restricted only if something else pulls it in
    Constrains,
}

/// A constraint that took part in a conflict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictConstraint {
    pub spec: MatchSpec,
    pub origin: ConstraintOrigin,
    pub kind: ConstraintKind,
}

impl fmt::Display for ConflictConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.origin) {
            (ConstraintKind::Constrains, ConstraintOrigin::Package(record)) => {
                write!(f, "{} (constrained by {})", self.spec, record)
            }
            _ => write!(f, "{} ({})", self.spec, self.origin),
        }
    }
}

/// A record that could not be chosen and why
#[derive(Debug, Clone)]
pub struct ExcludedCandidate {
    pub record: Arc<PackageRecord>,
    pub reason: String,
}

/// Why no record of `name` could be chosen
#[derive(Debug, Clone)]
pub struct Conflict {
    pub name: String,
    pub constraints: Vec<ConflictConstraint>,
    pub excluded: Vec<ExcludedCandidate>,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.excluded.is_empty() {
            writeln!(f, "  - nothing provides {}", self.name)?;
        } else {
            writeln!(f, "  - no acceptable record of {}", self.name)?;
        }
        for constraint in &self.constraints {
            writeln!(f, "      needs {}", constraint)?;
        }
        for candidate in &self.excluded {
            writeln!(f, "      {} is excluded: {}", candidate.record, candidate.reason)?;
        }
        Ok(())
    }
}

/// The request has no solution.
///
/// Lists, per conflicting name, the constraints involved and every candidate
/// record with the reason it was excluded.
#[derive(Error, Debug, Clone)]
pub struct UnsatisfiableError {
    pub conflicts: Vec<Conflict>,
}

impl UnsatisfiableError {
    pub fn new(conflicts: Vec<Conflict>) -> Self {
        Self { conflicts }
    }

    pub fn conflict(&self, name: &str) -> Option<&Conflict> {
        self.conflicts.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Every spec named in the explanation
    pub fn specs(&self) -> impl Iterator<Item = &MatchSpec> {
        self.conflicts
            .iter()
            .flat_map(|c| c.constraints.iter().map(|constraint| &constraint.spec))
    }
}

impl fmt::Display for UnsatisfiableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Could not find a set of packages satisfying the request:")?;
        for conflict in &self.conflicts {
            write!(f, "{}", conflict)?;
        }
        Ok(())
    }
}
