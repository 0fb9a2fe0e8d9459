//! Dependency resolution and transaction planning
//!
//! The [`Solver`] picks one record per package name by backtracking search
//! over an explicit stack of decision frames, with forward checking and
//! conflict-directed backjumping. The [`Planner`] turns a solve result and
//! the installed state into an ordered list of operations.

mod cancel;
mod policy;
mod problem;
mod request;
#[allow(clippy::module_inception)]
mod solver;
mod transaction;


pub use cancel::CancellationToken;
pub use policy::{ChannelPriority, Policy};
pub use problem::{Conflict, ConflictConstraint, ConstraintKind, ConstraintOrigin, ExcludedCandidate, UnsatisfiableError};
pub use request::Request;
pub use solver::{SolveError, Solver, SolverResult};
pub use transaction::{CyclicDependencyError, Operation, Planner, Transaction, TransactionSummary};
