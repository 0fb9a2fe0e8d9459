//! Conda-style environment resolution
//!
//! Resolves user-requested match specs against channel metadata into one
//! consistent package record per name, then plans the ordered install,
//! remove and reinstall operations that move an existing environment to that
//! state.

pub mod config;
pub mod environment;
pub mod error;
pub mod installer;
pub mod lock;
pub mod package;
pub mod repository;
pub mod solver;

pub use environment::{create_environment, CreateOptions, Environment, EnvironmentBuilder, EnvironmentReport};
pub use error::{EnvError, Result};
pub use lock::{LockFile, LockFileBuilder};
pub use package::{Channel, MatchSpec, PackageRecord, Platform, RecordKind};
pub use repository::{ChannelData, InstalledState, RepositoryIndex, VirtualPackage};
pub use solver::{Operation, Policy, Request, Solver, SolverResult, Transaction};

pub use kiln_version::{Version, VersionSpec};
