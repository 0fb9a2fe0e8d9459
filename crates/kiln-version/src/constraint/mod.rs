//! Constraint types for version matching

mod build_number;
#[allow(clippy::module_inception)]
mod constraint;
mod multi_constraint;
mod operator;
mod version_spec;

pub use build_number::{BuildNumberSpec, ParseBuildNumberSpecError};
pub use constraint::Constraint;
pub use multi_constraint::MultiConstraint;
pub use operator::{InvalidOperatorError, Operator};
pub use version_spec::{ParseConstraintError, VersionSpec};
