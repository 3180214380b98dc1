//! Store contract consumed by the transaction runner and batch executor.
//!
//! - [`CypherExecutor`] - Run statements, with or without results
//! - [`Transaction`] - Commit or roll back, consuming the transaction
//! - [`GraphClient`] - Begin transactions

use async_trait::async_trait;

use crate::error::AppError;
use crate::graph::row::{Params, RowStream};

/// Executes Cypher statements against a graph store.
///
/// Callbacks and units of work only ever see the store through
/// `&dyn CypherExecutor`, so the trait stays object safe.
#[async_trait]
pub trait CypherExecutor: Send + Sync {
    /// Executes a statement and returns a stream of result rows.
    ///
    /// Use this for statements that return data (MATCH ... RETURN).
    ///
    /// # Arguments
    ///
    /// * `cypher` - The Cypher statement
    /// * `params` - Values bound to `$name` placeholders
    ///
    /// # Returns
    ///
    /// A stream of rows borrowing the executor. Inside a transaction the
    /// rows reflect that transaction's uncommitted writes.
    async fn execute_cypher(&self, cypher: &str, params: Params)
        -> Result<RowStream<'_>, AppError>;

    /// Executes a statement without returning results.
    ///
    /// Use this for mutations (CREATE, MERGE, SET, DELETE).
    ///
    /// # Arguments
    ///
    /// * `cypher` - The Cypher statement
    /// * `params` - Values bound to `$name` placeholders
    async fn run_cypher(&self, cypher: &str, params: Params) -> Result<(), AppError>;
}

/// Transaction lifecycle management.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Commits the transaction, making all changes permanent.
    async fn commit(self) -> Result<(), AppError>;

    /// Rolls back the transaction, discarding all changes.
    async fn rollback(self) -> Result<(), AppError>;
}

/// A graph store client that can begin transactions.
///
/// Statements run directly on the client auto-commit. Statements run on a
/// transaction from [`begin`](GraphClient::begin) become visible only once
/// that transaction commits.
#[async_trait]
pub trait GraphClient: CypherExecutor {
    /// The transaction type returned by this client.
    type Tx<'a>: Transaction + CypherExecutor
    where
        Self: 'a;

    /// Begins a new transaction.
    ///
    /// Failing to begin is an infrastructure failure and is never retried
    /// or swallowed by the runner.
    async fn begin(&self) -> Result<Self::Tx<'_>, AppError>;
}
