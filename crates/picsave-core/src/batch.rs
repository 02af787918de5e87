//! Rate-limited batch execution
//!
//! Items run in contiguous slices of `batch_size`. Members of a slice run
//! concurrently; a pause separates consecutive slices so a burst of
//! downloads does not hammer a single origin. Every item yields exactly one
//! [`Settled`] outcome, in input order.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Default pause between slices in milliseconds
pub const DEFAULT_DELAY_MS: u64 = 500;

/// Default number of concurrent items per slice
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Batch shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Pause after each slice except the last
    pub delay_ms: u64,
    /// Items per slice; zero behaves as one
    pub batch_size: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_DELAY_MS,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl BatchOptions {
    /// Create default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[inline]
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Slice width actually used
    #[inline]
    #[must_use]
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}

/// Outcome of one batch item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled<T, E> {
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> Settled<T, E> {
    #[inline]
    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Settled::Fulfilled(_))
    }

    #[inline]
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Settled::Rejected(_))
    }

    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match self {
            Settled::Fulfilled(value) => Some(value),
            Settled::Rejected(_) => None,
        }
    }

    #[must_use]
    pub fn reason(&self) -> Option<&E> {
        match self {
            Settled::Fulfilled(_) => None,
            Settled::Rejected(reason) => Some(reason),
        }
    }

    /// Convert back into a `Result`
    ///
    /// # Errors
    /// Returns the rejection reason
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Settled::Fulfilled(value) => Ok(value),
            Settled::Rejected(reason) => Err(reason),
        }
    }
}

impl<T, E> From<Result<T, E>> for Settled<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Settled::Fulfilled(value),
            Err(reason) => Settled::Rejected(reason),
        }
    }
}

/// Run `f(item, index, items)` for every item in delayed slices
///
/// A failing item never affects its neighbours. Results line up with
/// `items` by index.
pub async fn batch_delay_for_each<T, R, E, F, Fut>(
    items: &[T],
    f: F,
    options: BatchOptions,
) -> Vec<Settled<R, E>>
where
    F: Fn(&T, usize, &[T]) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let size = options.effective_batch_size();
    let delay = options.delay();
    let mut results = Vec::with_capacity(items.len());

    for (slice, chunk) in items.chunks(size).enumerate() {
        let offset = slice * size;
        tracing::debug!(slice, offset, len = chunk.len(), total = items.len(), "starting batch slice");

        let outcomes = join_all(
            chunk
                .iter()
                .enumerate()
                .map(|(i, item)| f(item, offset + i, items)),
        )
        .await;
        results.extend(outcomes.into_iter().map(Settled::from));

        let is_last = offset + chunk.len() >= items.len();
        if !is_last && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    #[tokio::test]
    async fn results_keep_input_order() {
        let items: Vec<u64> = (1..=7).collect();
        let options = BatchOptions::new().with_batch_size(5).with_delay(Duration::ZERO);

        let results = batch_delay_for_each(
            &items,
            |&n, _, _| async move {
                // later items finish first inside a slice
                tokio::time::sleep(Duration::from_millis(40 - n * 5)).await;
                Ok::<_, String>(n * 10)
            },
            options,
        )
        .await;

        let values: Vec<u64> = results.into_iter().map(|r| r.into_result().unwrap()).collect();
        assert_eq!(values, vec![10, 20, 30, 40, 50, 60, 70]);
    }

    #[tokio::test]
    async fn rejection_is_isolated() {
        let items = vec![1, 2, 3, 4];
        let results = batch_delay_for_each(
            &items,
            |&n, _, _| async move {
                if n % 2 == 0 {
                    Err(format!("{n} is even"))
                } else {
                    Ok(n)
                }
            },
            BatchOptions::new().with_batch_size(2).with_delay(Duration::ZERO),
        )
        .await;

        assert_eq!(
            results,
            vec![
                Settled::Fulfilled(1),
                Settled::Rejected("2 is even".to_string()),
                Settled::Fulfilled(3),
                Settled::Rejected("4 is even".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn callback_sees_index_and_all_items() {
        let items = vec!["a", "b", "c"];
        let seen = Arc::new(Mutex::new(Vec::new()));

        let results = batch_delay_for_each(
            &items,
            |item, index, all| {
                seen.lock().unwrap().push((item.to_string(), index, all.len()));
                async { Ok::<_, ()>(()) }
            },
            BatchOptions::new().with_batch_size(0).with_delay(Duration::ZERO),
        )
        .await;

        assert_eq!(results.len(), 3);
        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                ("a".to_string(), 0, 3),
                ("b".to_string(), 1, 3),
                ("c".to_string(), 2, 3),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slices_are_separated_by_delay() {
        let items: Vec<usize> = (0..11).collect();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();

        let results = batch_delay_for_each(
            &items,
            |_, _, _| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, ()>(())
                }
            },
            BatchOptions::new(),
        )
        .await;

        assert_eq!(results.len(), 11);
        assert_eq!(peak.load(Ordering::SeqCst), DEFAULT_BATCH_SIZE);
        // three slices, two pauses
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(2 * DEFAULT_DELAY_MS + 30));
        assert!(elapsed < Duration::from_millis(3 * DEFAULT_DELAY_MS));
    }

    #[tokio::test]
    async fn empty_input() {
        let items: Vec<u8> = Vec::new();
        let results =
            batch_delay_for_each(&items, |_, _, _| async { Ok::<u8, ()>(0) }, BatchOptions::new()).await;
        assert!(results.is_empty());
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: BatchOptions = serde_json::from_str(r#"{ "batch_size": 2 }"#).unwrap();
        assert_eq!(options.batch_size, 2);
        assert_eq!(options.delay(), Duration::from_millis(DEFAULT_DELAY_MS));
        assert_eq!(BatchOptions::new().with_batch_size(0).effective_batch_size(), 1);
    }
}
