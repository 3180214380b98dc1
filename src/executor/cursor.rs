//! Lock-guarded cursor shared by every transaction attempt of a run.

use std::iter::{Fuse, Peekable};

use parking_lot::Mutex;

use crate::error::AppError;

type BoxedIter<T> = Box<dyn Iterator<Item = T> + Send>;

/// A single advancing position over an input sequence.
///
/// Every operation takes the same lock, so a check-and-fetch is never
/// interleaved with another caller's. The underlying iterator is fused:
/// once exhausted it stays exhausted.
pub struct SharedCursor<T> {
    inner: Mutex<Peekable<Fuse<BoxedIter<T>>>>,
}

impl<T> SharedCursor<T> {
    pub fn new<I>(input: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        let iter: BoxedIter<T> = Box::new(input.into_iter());
        Self {
            inner: Mutex::new(iter.fuse().peekable()),
        }
    }

    /// Draws the next item if there is one, as a single locked operation.
    pub fn try_advance(&self) -> Option<T> {
        self.inner.lock().next()
    }

    pub fn has_next(&self) -> bool {
        self.inner.lock().peek().is_some()
    }

    /// Draws the next item.
    ///
    /// # Errors
    ///
    /// [`AppError::EndOfSequence`] once the input is exhausted.
    pub fn next(&self) -> Result<T, AppError> {
        self.try_advance().ok_or(AppError::EndOfSequence)
    }
}

impl<T> std::fmt::Debug for SharedCursor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCursor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_draws_in_order_then_ends() {
        let cursor = SharedCursor::new(vec![1, 2, 3]);

        assert!(cursor.has_next());
        assert_eq!(cursor.next().unwrap(), 1);
        assert_eq!(cursor.try_advance(), Some(2));
        assert_eq!(cursor.next().unwrap(), 3);
        assert!(!cursor.has_next());
        assert!(matches!(cursor.next(), Err(AppError::EndOfSequence)));
    }

    #[test]
    fn test_has_next_does_not_consume() {
        let cursor = SharedCursor::new(std::iter::once("only"));

        assert!(cursor.has_next());
        assert!(cursor.has_next());
        assert_eq!(cursor.try_advance(), Some("only"));
        assert_eq!(cursor.try_advance(), None);
    }

    #[test]
    fn test_stays_exhausted() {
        // Yields None once, then resumes: the cursor must not resume with it.
        let mut calls = 0;
        let flaky = std::iter::from_fn(move || {
            calls += 1;
            match calls {
                1 => Some(1),
                2 => None,
                _ => Some(99),
            }
        });
        let cursor = SharedCursor::new(flaky);

        assert_eq!(cursor.try_advance(), Some(1));
        assert_eq!(cursor.try_advance(), None);
        assert_eq!(cursor.try_advance(), None);
    }

    #[test]
    fn test_concurrent_readers_share_one_position() {
        let cursor = Arc::new(SharedCursor::new(0..1000));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cursor = cursor.clone();
                std::thread::spawn(move || {
                    let mut drawn = Vec::new();
                    while let Some(item) = cursor.try_advance() {
                        drawn.push(item);
                    }
                    drawn
                })
            })
            .collect();

        let mut all: Vec<i32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..1000).collect::<Vec<_>>());
    }
}
