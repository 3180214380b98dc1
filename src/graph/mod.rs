//! Graph store abstraction.
//!
//! The batch executor never talks to a concrete database. It depends on a
//! small trait contract that any backend can implement:
//!
//! - [`CypherExecutor`] - Execute statements (required for all backends)
//! - [`Transaction`] - Transaction lifecycle (commit/rollback)
//! - [`GraphClient`] - Transaction creation
//!
//! # Usage
//!
//! ```ignore
//! use graphtx::graph::{Graph, QueryExt};
//! use graphtx::graph::backends::memory::MemoryClient;
//!
//! let graph = Graph::new(MemoryClient::new());
//!
//! graph.query("CREATE (n:Item {id: $id})")
//!     .param("id", 1)
//!     .run()
//!     .await?;
//!
//! let stats = graph
//!     .batch(unit_of_work)
//!     .batch_size(100)
//!     .input(items)?
//!     .execute()
//!     .await?;
//! ```

mod query;
mod row;
mod traits;

pub mod backends;

pub use query::{Query, QueryExt};
pub use row::{Params, Row, RowStream};
pub use traits::{CypherExecutor, GraphClient, Transaction};

use crate::error::AppError;
use crate::executor::{BatchExecutorBuilder, BatchTransactionExecutor, TransactionRunner};

/// Convenience wrapper around a [`GraphClient`].
///
/// Offers direct auto-commit queries and entry points into the transaction
/// runner and batch executor.
pub struct Graph<C: GraphClient> {
    client: C,
}

impl<C: GraphClient> Graph<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Creates a query builder for a direct (auto-commit) query.
    pub fn query(&self, cypher: &str) -> Query<'_, C> {
        Query::new(&self.client, cypher)
    }
}

impl<C: GraphClient + Clone> Graph<C> {
    /// A transaction runner over a clone of the client.
    pub fn runner(&self) -> TransactionRunner<C> {
        TransactionRunner::new(self.client.clone())
    }

    /// Starts building a batch executor for `unit_of_work`.
    pub fn batch<U>(&self, unit_of_work: U) -> BatchExecutorBuilder<C, U> {
        BatchTransactionExecutor::builder(self.client.clone(), unit_of_work)
    }
}

#[async_trait::async_trait]
impl<C: GraphClient> CypherExecutor for Graph<C> {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
    ) -> Result<RowStream<'_>, AppError> {
        self.client.execute_cypher(cypher, params).await
    }

    async fn run_cypher(&self, cypher: &str, params: Params) -> Result<(), AppError> {
        self.client.run_cypher(cypher, params).await
    }
}
