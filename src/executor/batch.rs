//! Batch transaction executor: drains an input through a unit of work,
//! one transaction per batch.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;

use crate::config::{ExecutorConfig, DEFAULT_BATCH_SIZE};
use crate::error::AppError;
use crate::executor::callback::{AcceptAll, FailureStrategy, TransactionCallback};
use crate::executor::cursor::SharedCursor;
use crate::executor::runner::TransactionRunner;
use crate::executor::unit_of_work::UnitOfWork;
use crate::graph::{CypherExecutor, GraphClient};

// ============================================================================
// Counters
// ============================================================================

/// Progress counters of a run, safe to read from any thread while it runs.
#[derive(Debug, Default)]
pub struct BatchCounters {
    total_steps: AtomicUsize,
    batches: AtomicUsize,
    successful_steps: AtomicUsize,
    failed_batches: AtomicUsize,
}

impl BatchCounters {
    /// Units of work attempted, whether or not their batch committed.
    pub fn total_steps(&self) -> usize {
        self.total_steps.load(Ordering::SeqCst)
    }

    /// Batches that attempted at least one step.
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    /// Units of work whose batch committed.
    pub fn successful_steps(&self) -> usize {
        self.successful_steps.load(Ordering::SeqCst)
    }

    /// Batches with at least one drawn step that did not commit.
    pub fn failed_batches(&self) -> usize {
        self.failed_batches.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ExecutionStats {
        ExecutionStats {
            total_steps: self.total_steps(),
            batches: self.batches(),
            successful_steps: self.successful_steps(),
            failed_batches: self.failed_batches(),
        }
    }
}

/// Point-in-time copy of [`BatchCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionStats {
    pub total_steps: usize,
    pub batches: usize,
    pub successful_steps: usize,
    pub failed_batches: usize,
}

impl ExecutionStats {
    pub fn failed_steps(&self) -> usize {
        self.total_steps.saturating_sub(self.successful_steps)
    }

    /// True when every attempted step committed.
    pub fn is_complete(&self) -> bool {
        self.total_steps == self.successful_steps
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Collects the settings of a [`BatchTransactionExecutor`] and normalizes
/// its input into one shared cursor.
pub struct BatchExecutorBuilder<C, U> {
    runner: TransactionRunner<C>,
    unit_of_work: U,
    batch_size: usize,
}

impl<C: GraphClient, U> BatchExecutorBuilder<C, U> {
    /// Units of work per transaction. Must be at least 1.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Retries of a batch after a transient store failure.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.runner = self.runner.with_max_retries(max_retries);
        self
    }

    /// Applies the `[executor]` configuration section.
    pub fn configure(self, config: &ExecutorConfig) -> Self {
        self.batch_size(config.batch_size)
            .max_retries(config.max_retries)
    }

    /// Builds an executor over a ready sequence or an iterator.
    pub fn input<I>(self, input: I) -> Result<BatchTransactionExecutor<C, I::Item, U>, AppError>
    where
        I: IntoIterator,
        I::Item: Send + 'static,
        I::IntoIter: Send + 'static,
        U: UnitOfWork<I::Item>,
    {
        self.build(SharedCursor::new(input))
    }

    /// Builds an executor whose input can only be produced inside a transaction
    /// (typically a query).
    ///
    /// Opens exactly one preparatory transaction. Any failure in it is returned.
    pub async fn transactional_input<I, F>(
        self,
        callback: &F,
    ) -> Result<BatchTransactionExecutor<C, I::Item, U>, AppError>
    where
        F: TransactionCallback<I> + ?Sized,
        I: IntoIterator,
        I::Item: Send + 'static,
        I::IntoIter: Send + 'static,
        U: UnitOfWork<I::Item>,
    {
        validate_batch_size(self.batch_size)?;

        let input = self
            .runner
            .execute_with(callback, &AcceptAll, FailureStrategy::Rethrow)
            .await?
            .ok_or_else(|| AppError::Internal("input transaction was rolled back".into()))?;
        tracing::debug!("Materialized batch input in a preparatory transaction");

        self.input(input)
    }

    /// Builds an executor that runs the unit of work `steps` times with no input.
    pub fn steps(self, steps: usize) -> Result<BatchTransactionExecutor<C, (), U>, AppError>
    where
        U: UnitOfWork<()>,
    {
        self.input(std::iter::repeat(()).take(steps))
    }

    fn build<T>(
        self,
        cursor: SharedCursor<T>,
    ) -> Result<BatchTransactionExecutor<C, T, U>, AppError>
    where
        T: Send + 'static,
        U: UnitOfWork<T>,
    {
        validate_batch_size(self.batch_size)?;

        Ok(BatchTransactionExecutor {
            runner: self.runner,
            unit_of_work: self.unit_of_work,
            batch_size: self.batch_size,
            cursor,
            counters: Arc::new(BatchCounters::default()),
        })
    }
}

fn validate_batch_size(batch_size: usize) -> Result<(), AppError> {
    if batch_size == 0 {
        return Err(AppError::Validation("batch size must be at least 1".into()));
    }
    Ok(())
}

// ============================================================================
// Executor
// ============================================================================

/// Executes a [`UnitOfWork`] for every input item, `batch_size` items per transaction.
///
/// A failing unit of work rolls back its whole batch; the run then carries on
/// with the next batch. Only infrastructure failures end a run early.
/// Batch `k` always covers items `(k - 1) * batch_size + 1 ..= k * batch_size`
/// unless a transient store failure cut an attempt short.
///
/// ```ignore
/// let executor = BatchTransactionExecutor::builder(client, work)
///     .batch_size(100)
///     .input(items)?;
///
/// let stats = executor.execute().await?;
/// if !stats.is_complete() {
///     // some batches rolled back
/// }
/// ```
pub struct BatchTransactionExecutor<C, T, U> {
    runner: TransactionRunner<C>,
    unit_of_work: U,
    batch_size: usize,
    cursor: SharedCursor<T>,
    counters: Arc<BatchCounters>,
}

impl<C, U> BatchTransactionExecutor<C, (), U>
where
    C: GraphClient,
{
    pub fn builder(client: C, unit_of_work: U) -> BatchExecutorBuilder<C, U> {
        BatchExecutorBuilder {
            runner: TransactionRunner::new(client),
            unit_of_work,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl<C, T, U> BatchTransactionExecutor<C, T, U>
where
    C: GraphClient,
    T: Send + 'static,
    U: UnitOfWork<T>,
{
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Shared handle on the live counters, for monitoring from another task.
    pub fn counters(&self) -> Arc<BatchCounters> {
        self.counters.clone()
    }

    pub fn stats(&self) -> ExecutionStats {
        self.counters.snapshot()
    }

    /// Drains the input, one transaction per batch.
    ///
    /// Returns the counters once the input is exhausted. Calling it again
    /// afterwards opens one empty transaction and changes nothing.
    ///
    /// # Errors
    ///
    /// Infrastructure failures (beginning or committing a transaction, a lost
    /// connection) end the run and are returned as-is.
    pub async fn execute(&self) -> Result<ExecutionStats, AppError> {
        loop {
            let batch_number = self.counters.batches.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::trace!(batch_number, "Starting transaction for batch");

            let attempted = AtomicUsize::new(0);
            let drawn = AtomicUsize::new(0);
            let batch = Batch {
                cursor: &self.cursor,
                unit_of_work: &self.unit_of_work,
                counters: &self.counters,
                attempted: &attempted,
                drawn: &drawn,
                batch_number,
                batch_size: self.batch_size,
                _item: PhantomData,
            };

            let outcome = self
                .runner
                .execute_with(&batch, &AcceptAll, FailureStrategy::CarryOn)
                .await;
            // `attempted` covers the last attempt only; `drawn` every attempt.
            let attempted = attempted.load(Ordering::SeqCst);
            let drawn = drawn.load(Ordering::SeqCst);

            if drawn == 0 {
                self.counters.batches.fetch_sub(1, Ordering::SeqCst);
                outcome?;
                break;
            }

            match outcome? {
                Some(()) => {
                    self.counters
                        .successful_steps
                        .fetch_add(attempted, Ordering::SeqCst);
                    tracing::trace!(batch_number, attempted, "Committed transaction for batch");
                    if attempted < drawn {
                        self.counters.failed_batches.fetch_add(1, Ordering::SeqCst);
                        tracing::warn!(
                            batch_number,
                            lost = drawn - attempted,
                            "Steps of a retried attempt were rolled back"
                        );
                    }
                }
                None => {
                    self.counters.failed_batches.fetch_add(1, Ordering::SeqCst);
                    tracing::warn!(batch_number, drawn, "Rolled back transaction for batch");
                }
            }

            if attempted == 0 {
                break;
            }
        }

        let stats = self.stats();
        tracing::debug!(
            successful_steps = stats.successful_steps,
            total_steps = stats.total_steps,
            batches = stats.batches,
            "Executed {} of {} steps in {} batches",
            stats.successful_steps,
            stats.total_steps,
            stats.batches
        );
        if !stats.is_complete() {
            tracing::warn!(
                failed_steps = stats.failed_steps(),
                failed_batches = stats.failed_batches,
                "Failed to execute {} steps",
                stats.failed_steps()
            );
        }

        Ok(stats)
    }
}

/// The transactional body of one batch.
///
/// A failing unit of work dooms the batch but the remaining items of the
/// batch are still attempted, so batch boundaries do not shift. Store
/// failures (infrastructure or transient) end the batch at once.
///
/// Re-invoked by the runner on retry: each invocation restarts its step count
/// and keeps drawing from the shared cursor, so no item is delivered twice.
/// `drawn` is never reset and counts the items of every attempt.
struct Batch<'e, T, U> {
    cursor: &'e SharedCursor<T>,
    unit_of_work: &'e U,
    counters: &'e BatchCounters,
    attempted: &'e AtomicUsize,
    drawn: &'e AtomicUsize,
    batch_number: usize,
    batch_size: usize,
    _item: PhantomData<fn() -> T>,
}

impl<'e, T, U> TransactionCallback<()> for Batch<'e, T, U>
where
    T: Send + 'static,
    U: UnitOfWork<T>,
{
    fn do_in_transaction<'a>(
        &'a self,
        tx: &'a dyn CypherExecutor,
    ) -> BoxFuture<'a, Result<(), AppError>> {
        Box::pin(async move {
            self.attempted.store(0, Ordering::SeqCst);
            let mut failure = None;

            while self.attempted.load(Ordering::SeqCst) < self.batch_size {
                let Some(item) = self.cursor.try_advance() else {
                    break;
                };
                self.counters.total_steps.fetch_add(1, Ordering::SeqCst);
                self.drawn.fetch_add(1, Ordering::SeqCst);
                let step_number = self.attempted.fetch_add(1, Ordering::SeqCst) + 1;

                let result = self
                    .unit_of_work
                    .execute(tx, item, self.batch_number, step_number)
                    .await;

                if let Err(err) = result {
                    if err.is_infrastructure() || err.is_transient() {
                        return Err(err);
                    }
                    tracing::debug!(
                        batch_number = self.batch_number,
                        step_number,
                        error = %err,
                        "Unit of work failed, batch will roll back"
                    );
                    failure.get_or_insert(err);
                }
            }

            match failure {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::unit_of_work::unit_of_work_fn;
    use crate::graph::backends::memory::MemoryClient;
    use futures::FutureExt;
    use parking_lot::Mutex;

    type Seen = Arc<Mutex<Vec<(usize, usize, u32)>>>;

    fn recording(seen: Seen, fail_on: Option<u32>) -> impl UnitOfWork<u32> {
        unit_of_work_fn(move |_tx, item: u32, batch, step| {
            let seen = seen.clone();
            async move {
                seen.lock().push((batch, step, item));
                if Some(item) == fail_on {
                    return Err(AppError::UnitOfWork(format!("item {} rejected", item)));
                }
                Ok(())
            }
            .boxed()
        })
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let seen = Seen::default();
        let result = BatchTransactionExecutor::builder(MemoryClient::new(), recording(seen, None))
            .batch_size(0)
            .input(vec![1u32, 2, 3]);

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_stats_helpers() {
        let stats = ExecutionStats {
            total_steps: 5,
            batches: 3,
            successful_steps: 3,
            failed_batches: 1,
        };
        assert_eq!(stats.failed_steps(), 2);
        assert!(!stats.is_complete());
        assert!(ExecutionStats::default().is_complete());
    }

    #[tokio::test]
    async fn test_batch_and_step_numbers() {
        let seen = Seen::default();
        let work = recording(seen.clone(), None);
        let executor = BatchTransactionExecutor::builder(MemoryClient::new(), work)
            .batch_size(2)
            .input(vec![10u32, 20, 30])
            .unwrap();

        executor.execute().await.unwrap();

        assert_eq!(
            *seen.lock(),
            vec![(1, 1, 10), (1, 2, 20), (2, 1, 30)]
        );
    }

    #[tokio::test]
    async fn test_failing_step_counts_as_attempted() {
        let seen = Seen::default();
        let work = recording(seen.clone(), Some(1));
        let executor = BatchTransactionExecutor::builder(MemoryClient::new(), work)
            .batch_size(3)
            .input(vec![1u32, 2, 3, 4])
            .unwrap();

        let stats = executor.execute().await.unwrap();

        // Item 1 fails; items 2 and 3 are still attempted and rolled back with it.
        assert_eq!(
            stats,
            ExecutionStats {
                total_steps: 4,
                batches: 2,
                successful_steps: 1,
                failed_batches: 1,
            }
        );
        assert_eq!(seen.lock()[1], (1, 2, 2));
        assert_eq!(seen.lock()[3], (2, 1, 4));
    }

    #[tokio::test]
    async fn test_counters_readable_mid_run() {
        let (paused_tx, paused_rx) = tokio::sync::oneshot::channel::<()>();
        let paused_tx = Mutex::new(Some(paused_tx));
        let resume = Arc::new(tokio::sync::Notify::new());
        let resume_work = resume.clone();
        let work = unit_of_work_fn(move |_tx, item: u32, _batch, _step| {
            let paused = if item == 6 { paused_tx.lock().take() } else { None };
            let resume = resume_work.clone();
            async move {
                if let Some(paused) = paused {
                    let _ = paused.send(());
                    resume.notified().await;
                }
                Ok(())
            }
            .boxed()
        });
        let executor = BatchTransactionExecutor::builder(MemoryClient::new(), work)
            .batch_size(4)
            .input(0u32..9)
            .unwrap();

        let counters = executor.counters();
        let monitor = tokio::spawn(async move {
            paused_rx.await.unwrap();
            let mid_run = counters.snapshot();
            resume.notify_one();
            mid_run
        });

        let stats = executor.execute().await.unwrap();
        let mid_run = monitor.await.unwrap();

        // Paused on the third step of batch 2, after batch 1 committed.
        assert_eq!(
            mid_run,
            ExecutionStats {
                total_steps: 7,
                batches: 2,
                successful_steps: 4,
                failed_batches: 0,
            }
        );
        assert_eq!(stats.batches, 3);
        assert_eq!(stats.successful_steps, 9);
    }
}
