//! Batched transactional execution.
//!
//! - [`TransactionRunner`] runs one [`TransactionCallback`] per transaction,
//!   committing or rolling back according to an [`AcceptancePolicy`] and a
//!   [`FailureStrategy`].
//! - [`BatchTransactionExecutor`] draws items from a [`SharedCursor`] and runs a
//!   [`UnitOfWork`] for each, `batch_size` items per transaction, tracking
//!   progress in [`BatchCounters`].
//!
//! ```ignore
//! use graphtx::executor::{unit_of_work_fn, BatchTransactionExecutor};
//! use graphtx::graph::QueryExt;
//! use futures::FutureExt;
//!
//! let work = unit_of_work_fn(|tx, id: i64, _batch, _step| {
//!     async move {
//!         tx.query("CREATE (n:Item {id: $id})").param("id", id).run().await
//!     }
//!     .boxed()
//! });
//!
//! let stats = BatchTransactionExecutor::builder(client, work)
//!     .batch_size(500)
//!     .input(1..=10_000)?
//!     .execute()
//!     .await?;
//! ```

mod batch;
mod callback;
mod cursor;
mod runner;
mod unit_of_work;

pub use batch::{BatchCounters, BatchExecutorBuilder, BatchTransactionExecutor, ExecutionStats};
pub use callback::{
    transaction_fn, AcceptAll, AcceptancePolicy, FailureStrategy, TransactionCallback,
    TransactionFn,
};
pub use cursor::SharedCursor;
pub use runner::TransactionRunner;
pub use unit_of_work::{unit_of_work_fn, UnitOfWork, UnitOfWorkFn};
