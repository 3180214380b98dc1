//! Single-transaction execution with commit/rollback decisions.

use crate::error::AppError;
use crate::executor::callback::{AcceptAll, AcceptancePolicy, FailureStrategy, TransactionCallback};
use crate::graph::{GraphClient, Transaction};

/// Runs callbacks, each inside its own transaction.
///
/// `Ok(Some(r))` means the transaction committed with result `r`;
/// `Ok(None)` means it was rolled back. Errors from beginning or committing
/// a transaction always propagate.
#[derive(Clone)]
pub struct TransactionRunner<C> {
    client: C,
    max_retries: u32,
}

impl<C: GraphClient> TransactionRunner<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            max_retries: 0,
        }
    }

    /// Re-runs a callback up to `max_retries` more times after a transient failure.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Runs `callback`, committing any result and returning any error.
    pub async fn execute<R, F>(&self, callback: &F) -> Result<Option<R>, AppError>
    where
        F: TransactionCallback<R> + ?Sized,
    {
        self.execute_with(callback, &AcceptAll, FailureStrategy::Rethrow)
            .await
    }

    /// Runs `callback`, committing only results `policy` accepts.
    ///
    /// A callback error rolls the transaction back. Transient errors are
    /// retried while the retry budget lasts; after that `strategy` decides
    /// between returning the error and reporting a rollback.
    pub async fn execute_with<R, F, P>(
        &self,
        callback: &F,
        policy: &P,
        strategy: FailureStrategy,
    ) -> Result<Option<R>, AppError>
    where
        F: TransactionCallback<R> + ?Sized,
        P: AcceptancePolicy<R> + ?Sized,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            tracing::trace!(attempt, "Starting transaction");

            let txn = self.client.begin().await?;
            let outcome = callback.do_in_transaction(&txn).await;

            let err = match outcome {
                Ok(result) if policy.accepts(&result) => {
                    txn.commit().await?;
                    tracing::trace!(attempt, "Committed transaction");
                    return Ok(Some(result));
                }
                Ok(_) => {
                    txn.rollback().await?;
                    tracing::debug!(attempt, "Result not accepted, rolled back transaction");
                    return Ok(None);
                }
                Err(err) => {
                    txn.rollback().await?;
                    err
                }
            };

            if err.is_transient() && attempt <= self.max_retries {
                tracing::warn!(attempt, error = %err, "Transient failure, retrying transaction");
                continue;
            }

            return match strategy {
                FailureStrategy::CarryOn if !err.is_infrastructure() => {
                    tracing::warn!(error = %err, "Rolled back transaction");
                    Ok(None)
                }
                _ => Err(err),
            };
        }
    }
}
