//! Applying planned transactions to an environment.
//!
//! Extracting and linking package archives is left to the caller's
//! [`OperationExecutor`]. [`CondaMetaWriter`] only keeps the
//! `conda-meta` records of a prefix in step with the plan, which is what
//! [`CondaMetaReader`](crate::repository::CondaMetaReader) reads back.

mod conda_meta;

use async_trait::async_trait;

use crate::solver::Transaction;

pub use conda_meta::CondaMetaWriter;

/// Applies the operations of a transaction, in order
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    async fn execute(&self, transaction: &Transaction) -> anyhow::Result<()>;
}
