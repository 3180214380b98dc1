//! In-memory journaling backend.
//!
//! Statements are not interpreted. The store keeps a journal of committed
//! statements: writes made inside a transaction are buffered and appended to
//! the journal on commit, or discarded on rollback. Reads return canned rows
//! registered per statement text.
//!
//! Fault injection covers the failure classes the runner distinguishes:
//! an offline store (infrastructure), rejected commits (infrastructure) and
//! transient statement failures (retryable).
//!
//! ```ignore
//! let client = MemoryClient::new();
//! client.respond_with("MATCH (n:Item) RETURN n.id AS id", rows);
//!
//! let txn = client.begin().await?;
//! txn.query("CREATE (n:Item {id: $id})").param("id", 1).run().await?;
//! txn.commit().await?;
//!
//! assert_eq!(client.committed().len(), 1);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::AppError;
use crate::graph::row::{Params, Row, RowStream};
use crate::graph::traits::{CypherExecutor, GraphClient, Transaction};

/// A statement recorded by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub cypher: String,
    pub params: Params,
}

/// Counts of transaction lifecycle events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionLog {
    pub begun: usize,
    pub committed: usize,
    pub rolled_back: usize,
}

#[derive(Default)]
struct State {
    journal: Vec<Statement>,
    responses: HashMap<String, Vec<Row>>,
    log: TransactionLog,
    offline: bool,
    reject_commits: bool,
    transient_failures: usize,
}

impl State {
    fn check_online(&self) -> Result<(), AppError> {
        if self.offline {
            return Err(AppError::Connection("store is offline".into()));
        }
        Ok(())
    }

    fn rows_for(&self, cypher: &str) -> Vec<Row> {
        self.responses.get(cypher).cloned().unwrap_or_default()
    }
}

/// In-memory graph client. Cheap to clone; clones share the same store.
#[derive(Clone, Default)]
pub struct MemoryClient {
    state: Arc<Mutex<State>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the rows returned whenever exactly `cypher` is executed.
    pub fn respond_with(&self, cypher: &str, rows: Vec<Row>) {
        self.state.lock().responses.insert(cypher.to_string(), rows);
    }

    /// Takes the store offline: every begin and statement fails with a connection error.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Makes every commit fail with a connection error.
    pub fn reject_commits(&self, reject: bool) {
        self.state.lock().reject_commits = reject;
    }

    /// Fails the next `count` transactional statements with a transient error.
    pub fn inject_transient_failures(&self, count: usize) {
        self.state.lock().transient_failures = count;
    }

    /// Committed statements, in commit order.
    pub fn committed(&self) -> Vec<Statement> {
        self.state.lock().journal.clone()
    }

    pub fn transaction_log(&self) -> TransactionLog {
        self.state.lock().log
    }
}

fn row_stream(rows: Vec<Row>) -> RowStream<'static> {
    Box::pin(futures::stream::iter(rows.into_iter().map(Ok)))
}

#[async_trait]
impl CypherExecutor for MemoryClient {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
    ) -> Result<RowStream<'_>, AppError> {
        let mut state = self.state.lock();
        state.check_online()?;
        let rows = state.rows_for(cypher);
        state.journal.push(Statement {
            cypher: cypher.to_string(),
            params,
        });
        Ok(row_stream(rows))
    }

    async fn run_cypher(&self, cypher: &str, params: Params) -> Result<(), AppError> {
        self.execute_cypher(cypher, params).await.map(drop)
    }
}

#[async_trait]
impl GraphClient for MemoryClient {
    type Tx<'a> = MemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx<'_>, AppError> {
        let mut state = self.state.lock();
        state.check_online()?;
        state.log.begun += 1;

        Ok(MemoryTransaction {
            state: self.state.clone(),
            pending: Mutex::new(Vec::new()),
            finished: false,
        })
    }
}

/// A transaction buffering its statements until commit.
///
/// Dropping it without commit or rollback discards the buffer and logs a warning.
pub struct MemoryTransaction {
    state: Arc<Mutex<State>>,
    pending: Mutex<Vec<Statement>>,
    finished: bool,
}

#[async_trait]
impl CypherExecutor for MemoryTransaction {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
    ) -> Result<RowStream<'_>, AppError> {
        let rows = {
            let mut state = self.state.lock();
            state.check_online()?;
            if state.transient_failures > 0 {
                state.transient_failures -= 1;
                return Err(AppError::Transient(format!(
                    "deadlock detected while executing: {}",
                    cypher
                )));
            }
            state.rows_for(cypher)
        };

        self.pending.lock().push(Statement {
            cypher: cypher.to_string(),
            params,
        });
        Ok(row_stream(rows))
    }

    async fn run_cypher(&self, cypher: &str, params: Params) -> Result<(), AppError> {
        self.execute_cypher(cypher, params).await.map(drop)
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn commit(mut self) -> Result<(), AppError> {
        self.finished = true;
        let pending = std::mem::take(&mut *self.pending.lock());

        let mut state = self.state.lock();
        if state.offline || state.reject_commits {
            state.log.rolled_back += 1;
            return Err(AppError::Connection("commit rejected by store".into()));
        }
        state.journal.extend(pending);
        state.log.committed += 1;
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), AppError> {
        self.finished = true;
        self.pending.lock().clear();
        self.state.lock().log.rolled_back += 1;
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("MemoryTransaction dropped without commit or rollback - changes discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::QueryExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_commit_publishes_statements() {
        let client = MemoryClient::new();

        let txn = client.begin().await.unwrap();
        txn.query("CREATE (n:Item {id: $id})")
            .param("id", 1)
            .run()
            .await
            .unwrap();
        assert!(client.committed().is_empty());
        txn.commit().await.unwrap();

        let committed = client.committed();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].params["id"], json!(1));
        assert_eq!(
            client.transaction_log(),
            TransactionLog {
                begun: 1,
                committed: 1,
                rolled_back: 0
            }
        );
    }

    #[tokio::test]
    async fn test_rollback_discards_statements() {
        let client = MemoryClient::new();

        let txn = client.begin().await.unwrap();
        txn.query("CREATE (n:Item)").run().await.unwrap();
        txn.rollback().await.unwrap();

        assert!(client.committed().is_empty());
        assert_eq!(client.transaction_log().rolled_back, 1);
    }

    #[tokio::test]
    async fn test_canned_rows() {
        let client = MemoryClient::new();
        client.respond_with(
            "MATCH (n:Item) RETURN n.id AS id",
            vec![Row::from_pairs([("id", json!(1))]), Row::from_pairs([("id", json!(2))])],
        );

        let rows = client
            .query("MATCH (n:Item) RETURN n.id AS id")
            .fetch_all()
            .await
            .unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.get("id").unwrap()).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_offline_store_refuses_to_begin() {
        let client = MemoryClient::new();
        client.set_offline(true);

        let err = client.begin().await.err().unwrap();
        assert!(err.is_infrastructure());
        assert_eq!(client.transaction_log().begun, 0);
    }

    #[tokio::test]
    async fn test_rejected_commit() {
        let client = MemoryClient::new();
        client.reject_commits(true);

        let txn = client.begin().await.unwrap();
        txn.query("CREATE (n:Item)").run().await.unwrap();
        let err = txn.commit().await.unwrap_err();

        assert!(err.is_infrastructure());
        assert!(client.committed().is_empty());
    }

    #[tokio::test]
    async fn test_transient_failures_are_consumed() {
        let client = MemoryClient::new();
        client.inject_transient_failures(1);

        let txn = client.begin().await.unwrap();
        let first = txn.query("CREATE (n:Item)").run().await;
        let second = txn.query("CREATE (n:Item)").run().await;
        txn.commit().await.unwrap();

        assert!(first.unwrap_err().is_transient());
        assert!(second.is_ok());
        assert_eq!(client.committed().len(), 1);
    }
}
