// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use super::Result;
use crate::config::consts::{
    DEFAULT_BASE_DELAY_SECS, DEFAULT_EXPONENTIAL_BASE, DEFAULT_JITTER_RATIO,
    DEFAULT_MAX_DELAY_SECS, DEFAULT_MAX_RETRIES,
};
use crate::observability::messages::errors::{RetryExhausted, RetryScheduled};

/// Exponential-backoff retry strategy.
///
/// The delay before retry `n` (0-based) is
/// `base_delay * exponential_base^n`, capped at `max_delay`, then shifted by a
/// random jitter of up to ±25% when `jitter` is on. Only errors whose
/// [`super::CorpusError::is_retryable`] is true are retried; everything else is
/// returned on first failure.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_secs_f64(DEFAULT_BASE_DELAY_SECS),
            max_delay: Duration::from_secs_f64(DEFAULT_MAX_DELAY_SECS),
            exponential_base: DEFAULT_EXPONENTIAL_BASE,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay to wait after failed attempt number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.exponential_base.powi(attempt.min(i32::MAX as u32) as i32);
        let mut secs = (self.base_delay.as_secs_f64() * exp).min(self.max_delay.as_secs_f64());

        if self.jitter && secs > 0.0 {
            let spread = secs * DEFAULT_JITTER_RATIO;
            secs += rand::thread_rng().gen_range(-spread..=spread);
        }

        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Run `f` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent. `f` is called at most `max_retries + 1` times.
    pub async fn retry<T, F, Fut>(&self, operation: &str, f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.retry_counted(operation, f).await.0
    }

    /// Like [`RetryPolicy::retry`] but also reports how many retries were made.
    pub async fn retry_counted<T, F, Fut>(&self, operation: &str, mut f: F) -> (Result<T>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(value) => return (Ok(value), attempt),
                Err(e) => match self.next_delay(operation, attempt, &e) {
                    Some(delay) => {
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return (Err(e), attempt),
                },
            }
        }
    }

    /// Blocking variant for synchronous call sites such as file I/O.
    pub fn retry_blocking<T, F>(&self, operation: &str, mut f: F) -> (Result<T>, u32)
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            match f() {
                Ok(value) => return (Ok(value), attempt),
                Err(e) => match self.next_delay(operation, attempt, &e) {
                    Some(delay) => {
                        std::thread::sleep(delay);
                        attempt += 1;
                    }
                    None => return (Err(e), attempt),
                },
            }
        }
    }

    fn next_delay(
        &self,
        operation: &str,
        attempt: u32,
        error: &super::CorpusError,
    ) -> Option<Duration> {
        if !error.is_retryable() {
            return None;
        }
        if attempt >= self.max_retries {
            tracing::error!(
                "{}",
                RetryExhausted {
                    operation,
                    attempts: attempt + 1,
                    error,
                }
            );
            return None;
        }

        let delay = self.delay_for(attempt);
        tracing::warn!(
            "{}",
            RetryScheduled {
                operation,
                attempt: attempt + 1,
                delay,
                error,
            }
        );
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CorpusError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(200),
            exponential_base: 2.0,
            jitter: true,
        }
    }

    #[test]
    fn test_delay_growth_and_cap() {
        let policy = RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        };

        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(10), Duration::from_secs(60));
    }

    #[test]
    fn test_jitter_stays_within_quarter() {
        let policy = RetryPolicy::default();
        for _ in 0..200 {
            let d = policy.delay_for(0).as_secs_f64();
            assert!((0.75..=1.25).contains(&d), "jittered delay {} out of range", d);
        }
    }

    #[tokio::test]
    async fn test_retry_call_bound_and_first_sleep() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = fast_policy(3);
        let started = Instant::now();

        let counter = calls.clone();
        let result: Result<()> = policy
            .retry("always_fails", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(CorpusError::Network("refused".into()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4, "max_retries + 1 calls");
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[tokio::test]
    async fn test_non_retryable_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let (result, retries) = fast_policy(3)
            .retry_counted("bad_data", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(CorpusError::Data("malformed".into()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(retries, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_blocking_retry_recovers() {
        let mut calls = 0;
        let (result, retries) = fast_policy(3).retry_blocking("flaky", || {
            calls += 1;
            if calls < 3 {
                Err(CorpusError::Timeout("slow disk".into()))
            } else {
                Ok(calls)
            }
        });

        assert_eq!(result.unwrap(), 3);
        assert_eq!(retries, 2);
    }
}
