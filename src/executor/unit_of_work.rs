//! The per-item operation run by the batch executor.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::AppError;
use crate::graph::CypherExecutor;

/// An operation performed for one input item inside the current batch's transaction.
///
/// `batch_number` starts at 1 for the first batch; `step_number` starts at 1
/// within each batch. Returning an error rolls back the whole batch.
/// Implementations never commit or roll back themselves.
pub trait UnitOfWork<T: Send + 'static>: Send + Sync {
    /// Processes one item.
    ///
    /// # Arguments
    ///
    /// * `tx` - The batch's transaction
    /// * `item` - The input item, moved out of the cursor
    /// * `batch_number` - 1-based number of the enclosing batch
    /// * `step_number` - 1-based position of the item within its batch
    fn execute<'a>(
        &'a self,
        tx: &'a dyn CypherExecutor,
        item: T,
        batch_number: usize,
        step_number: usize,
    ) -> BoxFuture<'a, Result<(), AppError>>;
}

impl<T, U> UnitOfWork<T> for Arc<U>
where
    T: Send + 'static,
    U: UnitOfWork<T> + ?Sized,
{
    fn execute<'a>(
        &'a self,
        tx: &'a dyn CypherExecutor,
        item: T,
        batch_number: usize,
        step_number: usize,
    ) -> BoxFuture<'a, Result<(), AppError>> {
        (**self).execute(tx, item, batch_number, step_number)
    }
}

/// Closure adapter produced by [`unit_of_work_fn`].
pub struct UnitOfWorkFn<F>(F);

/// Turns a closure into a [`UnitOfWork`].
///
/// ```ignore
/// let work = unit_of_work_fn(|tx, id: i64, _batch, _step| {
///     Box::pin(async move { tx.query("CREATE (n:Item {id: $id})").param("id", id).run().await })
/// });
/// ```
pub fn unit_of_work_fn<T, F>(f: F) -> UnitOfWorkFn<F>
where
    T: Send + 'static,
    F: for<'a> Fn(&'a dyn CypherExecutor, T, usize, usize) -> BoxFuture<'a, Result<(), AppError>>
        + Send
        + Sync,
{
    UnitOfWorkFn(f)
}

impl<T, F> UnitOfWork<T> for UnitOfWorkFn<F>
where
    T: Send + 'static,
    F: for<'a> Fn(&'a dyn CypherExecutor, T, usize, usize) -> BoxFuture<'a, Result<(), AppError>>
        + Send
        + Sync,
{
    fn execute<'a>(
        &'a self,
        tx: &'a dyn CypherExecutor,
        item: T,
        batch_number: usize,
        step_number: usize,
    ) -> BoxFuture<'a, Result<(), AppError>> {
        (self.0)(tx, item, batch_number, step_number)
    }
}
