// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for error reporting and retries.

use crate::errors::{CorpusError, ErrorInfo};
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// An error was classified and recorded by the reporter.
///
/// # Log Level
/// Chosen by severity: `error!` for high and critical, `warn!` for medium,
/// `info!` for low.
pub struct ErrorReported<'a> {
    pub info: &'a ErrorInfo,
}

impl Display for ErrorReported<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} ({}): {} [operation={}, retries={}]",
            self.info.severity,
            self.info.exception_type,
            self.info.category,
            self.info.message,
            self.info
                .context
                .get("operation")
                .map(String::as_str)
                .unwrap_or("unknown"),
            self.info.retry_count
        )
    }
}

/// A retryable failure will be attempted again after `delay`.
///
/// # Log Level
/// `warn!`
pub struct RetryScheduled<'a> {
    pub operation: &'a str,
    pub attempt: u32,
    pub delay: Duration,
    pub error: &'a CorpusError,
}

impl Display for RetryScheduled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Attempt {} of '{}' failed: {}. Retrying in {:.2}s",
            self.attempt,
            self.operation,
            self.error,
            self.delay.as_secs_f64()
        )
    }
}

/// Every attempt failed.
///
/// # Log Level
/// `error!`
pub struct RetryExhausted<'a> {
    pub operation: &'a str,
    pub attempts: u32,
    pub error: &'a CorpusError,
}

impl Display for RetryExhausted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "'{}' failed after {} attempts: {}",
            self.operation, self.attempts, self.error
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_scheduled_format() {
        let error = CorpusError::Timeout("llm request".into());
        let msg = RetryScheduled {
            operation: "llm_call",
            attempt: 2,
            delay: Duration::from_millis(1500),
            error: &error,
        };
        assert_eq!(
            msg.to_string(),
            "Attempt 2 of 'llm_call' failed: Timed out: llm request. Retrying in 1.50s"
        );
    }
}
