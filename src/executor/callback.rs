//! Transactional callbacks and the policies applied to their outcome.

use futures::future::BoxFuture;

use crate::error::AppError;
use crate::graph::CypherExecutor;

/// Work run with an active transaction bound to `tx`.
///
/// Must be callable more than once: the runner re-invokes it when a
/// transient failure is retried in a fresh transaction.
pub trait TransactionCallback<R>: Send + Sync {
    /// Runs the work against the open transaction.
    ///
    /// # Arguments
    ///
    /// * `tx` - The transaction; statements run on it commit or roll back together
    ///
    /// # Returns
    ///
    /// The result handed to the [`AcceptancePolicy`]. An error rolls the
    /// transaction back.
    fn do_in_transaction<'a>(
        &'a self,
        tx: &'a dyn CypherExecutor,
    ) -> BoxFuture<'a, Result<R, AppError>>;
}

/// Closure adapter produced by [`transaction_fn`].
pub struct TransactionFn<F>(F);

/// Turns a closure into a [`TransactionCallback`].
///
/// ```ignore
/// let callback = transaction_fn(|tx| {
///     Box::pin(async move { tx.query("MATCH (n:Item) RETURN n.id AS id").fetch_all().await })
/// });
/// ```
pub fn transaction_fn<R, F>(f: F) -> TransactionFn<F>
where
    F: for<'a> Fn(&'a dyn CypherExecutor) -> BoxFuture<'a, Result<R, AppError>> + Send + Sync,
{
    TransactionFn(f)
}

impl<R, F> TransactionCallback<R> for TransactionFn<F>
where
    F: for<'a> Fn(&'a dyn CypherExecutor) -> BoxFuture<'a, Result<R, AppError>> + Send + Sync,
{
    fn do_in_transaction<'a>(
        &'a self,
        tx: &'a dyn CypherExecutor,
    ) -> BoxFuture<'a, Result<R, AppError>> {
        (self.0)(tx)
    }
}

/// Decides whether a callback result that did not fail may be committed.
pub trait AcceptancePolicy<R>: Send + Sync {
    /// Returns `true` to commit, `false` to roll back.
    fn accepts(&self, result: &R) -> bool;
}

/// Commits every result that did not fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl<R> AcceptancePolicy<R> for AcceptAll {
    fn accepts(&self, _result: &R) -> bool {
        true
    }
}

impl<R, F> AcceptancePolicy<R> for F
where
    F: Fn(&R) -> bool + Send + Sync,
{
    fn accepts(&self, result: &R) -> bool {
        self(result)
    }
}

/// What the runner does with a callback error once the transaction is rolled back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailureStrategy {
    /// Return the error to the caller.
    #[default]
    Rethrow,
    /// Log the error and report a rollback (`Ok(None)`).
    /// Infrastructure errors are still returned.
    CarryOn,
}
