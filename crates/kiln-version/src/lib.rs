//! Conda-style package versions and version constraints
//!
//! This crate provides version parsing with a total order (epochs, dev/post
//! markers, local versions), version spec parsing (`>=1.2,<2|3.*`), build
//! number constraints and build-string glob matching.

pub mod constraint;
mod string_matcher;
mod version;
mod version_parser;

pub use constraint::{
    BuildNumberSpec, Constraint, MultiConstraint, Operator, ParseBuildNumberSpecError,
    ParseConstraintError, VersionSpec,
};
pub use string_matcher::{ParseStringMatcherError, StringMatcher};
pub use version::{Component, Segment, Version};
pub use version_parser::ParseVersionError;
