// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Bounded, order-preserving fan-out over the records of one stage.
//!
//! Every item becomes its own task; a semaphore sized `max_workers` bounds
//! how many run at once. Results are collected by index, so output order is
//! input order whatever order the tasks finish in.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::errors::{CorpusError, Result};

/// Apply async `f` to every item with at most `max_workers` in flight.
///
/// `f` receives the item's index. A task that panics fails the whole map
/// with [`CorpusError::Internal`]; ordinary failures belong in `O`.
pub async fn ordered_map<I, O, F, Fut>(items: Vec<I>, max_workers: usize, f: F) -> Result<Vec<O>>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(usize, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let f = Arc::new(f);

    let mut handles = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let f = f.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.map_err(|e| {
                CorpusError::Internal(format!("worker pool closed before task {}: {}", index, e))
            })?;
            Ok::<O, CorpusError>(f(index, item).await)
        }));
    }

    collect(handles).await
}

/// Blocking counterpart of [`ordered_map`] for CPU-bound per-record work.
pub async fn ordered_map_blocking<I, O, F>(items: Vec<I>, max_workers: usize, f: F) -> Result<Vec<O>>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(usize, I) -> O + Send + Sync + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let f = Arc::new(f);

    let mut handles = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let f = f.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.map_err(|e| {
                CorpusError::Internal(format!("worker pool closed before task {}: {}", index, e))
            })?;
            tokio::task::spawn_blocking(move || f(index, item))
                .await
                .map_err(|e| CorpusError::Internal(format!("worker task {} failed: {}", index, e)))
        }));
    }

    collect(handles).await
}

async fn collect<O>(handles: Vec<tokio::task::JoinHandle<Result<O>>>) -> Result<Vec<O>> {
    let mut results = Vec::with_capacity(handles.len());
    for (index, handle) in handles.into_iter().enumerate() {
        let result = handle
            .await
            .map_err(|e| CorpusError::Internal(format!("worker task {} failed: {}", index, e)))?;
        results.push(result?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_follow_input_order() {
        // Earlier items sleep longer, so they finish last
        let items: Vec<u64> = (0..16).collect();
        let results = ordered_map(items, 8, |index, item| async move {
            tokio::time::sleep(Duration::from_millis(16 - item)).await;
            (index, item * 2)
        })
        .await
        .unwrap();

        for (position, (index, doubled)) in results.into_iter().enumerate() {
            assert_eq!(index, position);
            assert_eq!(doubled, position as u64 * 2);
        }
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (in_flight_c, peak_c) = (in_flight.clone(), peak.clone());
        ordered_map((0..20).collect::<Vec<_>>(), 3, move |_, _: i32| {
            let in_flight = in_flight_c.clone();
            let peak = peak_c.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_blocking_map_and_zero_workers() {
        struct TestCase {
            name: &'static str,
            max_workers: usize,
            items: Vec<&'static str>,
        }

        let test_cases = vec![
            TestCase {
                name: "zero workers is treated as one",
                max_workers: 0,
                items: vec!["a", "bb", "ccc"],
            },
            TestCase {
                name: "more workers than items",
                max_workers: 10,
                items: vec!["x", "yy"],
            },
            TestCase {
                name: "empty input",
                max_workers: 4,
                items: vec![],
            },
        ];

        for tc in test_cases {
            let expected: Vec<usize> = tc.items.iter().map(|s| s.len()).collect();
            let results = ordered_map_blocking(tc.items, tc.max_workers, |_, s: &str| s.len())
                .await
                .unwrap();
            assert_eq!(results, expected, "mismatch for '{}'", tc.name);
        }
    }

    #[tokio::test]
    async fn test_panicking_task_is_internal_error() {
        let result = ordered_map_blocking(vec![1, 2, 3], 2, |_, n: i32| {
            if n == 2 {
                panic!("record two");
            }
            n
        })
        .await;
        assert!(matches!(result, Err(CorpusError::Internal(_))));
    }
}
