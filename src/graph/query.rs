//! Query builder for fluent statement construction.

use futures::{StreamExt, TryStreamExt};
use serde::Serialize;

use crate::error::AppError;
use crate::graph::row::{Params, Row, RowStream};
use crate::graph::traits::CypherExecutor;

/// A builder for parameterized statements against any [`CypherExecutor`],
/// including the `&dyn CypherExecutor` handed to units of work.
///
/// ```ignore
/// let rows = Query::new(tx, "MATCH (n:Item) WHERE n.id = $id RETURN n")
///     .param("id", 42)
///     .fetch_all()
///     .await?;
/// ```
pub struct Query<'a, E: CypherExecutor + ?Sized> {
    executor: &'a E,
    cypher: String,
    params: Params,
    invalid: Option<String>,
}

impl<'a, E: CypherExecutor + ?Sized> Query<'a, E> {
    pub fn new(executor: &'a E, cypher: &str) -> Self {
        Self {
            executor,
            cypher: cypher.to_string(),
            params: Params::new(),
            invalid: None,
        }
    }

    /// Adds a parameter, referenced in Cypher as `$name`.
    ///
    /// A value that fails to serialize is reported when the query runs.
    pub fn param<T: Serialize>(mut self, name: &str, value: T) -> Self {
        match serde_json::to_value(value) {
            Ok(json_value) => {
                self.params.insert(name.to_string(), json_value);
            }
            Err(e) => {
                self.invalid.get_or_insert_with(|| {
                    format!("parameter '{}' cannot be serialized: {}", name, e)
                });
            }
        }
        self
    }

    fn into_parts(self) -> Result<(&'a E, String, Params), AppError> {
        match self.invalid {
            Some(message) => Err(AppError::Validation(message)),
            None => Ok((self.executor, self.cypher, self.params)),
        }
    }

    /// Executes the query and returns a stream of rows.
    pub async fn execute(self) -> Result<RowStream<'a>, AppError> {
        let (executor, cypher, params) = self.into_parts()?;
        executor.execute_cypher(&cypher, params).await
    }

    /// Executes the query and collects all rows.
    pub async fn fetch_all(self) -> Result<Vec<Row>, AppError> {
        self.execute().await?.try_collect().await
    }

    /// Executes the query and returns the first row, if any.
    pub async fn fetch_one(self) -> Result<Option<Row>, AppError> {
        let mut stream = self.execute().await?;
        stream.next().await.transpose()
    }

    /// Executes the query without returning results.
    pub async fn run(self) -> Result<(), AppError> {
        let (executor, cypher, params) = self.into_parts()?;
        executor.run_cypher(&cypher, params).await
    }
}

/// Adds `executor.query("...")` to every [`CypherExecutor`], sized or not.
pub trait QueryExt: CypherExecutor {
    fn query(&self, cypher: &str) -> Query<'_, Self> {
        Query::new(self, cypher)
    }
}

impl<E: CypherExecutor + ?Sized> QueryExt for E {}
