// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for managed operator lifecycles and hooks.

use crate::errors::CorpusError;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Configuration was merged into an operator.
///
/// # Log Level
/// `debug!`
pub struct OperatorConfigured<'a> {
    pub operator: &'a str,
    pub keys: usize,
}

impl Display for OperatorConfigured<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Operator '{}' configured ({} keys)",
            self.operator, self.keys
        )
    }
}

/// An execution is starting.
///
/// # Log Level
/// `debug!` - Text operators run once per record
pub struct OperatorExecutionStarted<'a> {
    pub operator: &'a str,
    pub execution: u64,
}

impl Display for OperatorExecutionStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Operator '{}' starting execution #{}",
            self.operator, self.execution
        )
    }
}

impl StructuredLog for OperatorExecutionStarted<'_> {
    fn log(&self) {
        tracing::debug!(
            operator = self.operator,
            execution = self.execution,
            "{}",
            self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "operator",
            span_name = name,
            operator = self.operator,
            execution = self.execution,
        )
    }
}

/// # Log Level
/// `debug!`
pub struct OperatorExecutionCompleted<'a> {
    pub operator: &'a str,
    pub elapsed: Duration,
}

impl Display for OperatorExecutionCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Operator '{}' completed in {:?}",
            self.operator, self.elapsed
        )
    }
}

/// An execution returned an error. The error itself is reported through
/// the error handler.
///
/// # Log Level
/// `debug!`
pub struct OperatorExecutionFailed<'a> {
    pub operator: &'a str,
    pub error: &'a CorpusError,
}

impl Display for OperatorExecutionFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Operator '{}' failed: {}", self.operator, self.error)
    }
}

/// `reset()` or `stop()` was called.
///
/// # Log Level
/// `info!`
pub struct OperatorControlRequested<'a> {
    pub operator: &'a str,
    pub action: &'a str,
}

impl Display for OperatorControlRequested<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Operator '{}': {} requested", self.operator, self.action)
    }
}

/// A lifecycle hook returned an error or panicked. The lifecycle continues.
///
/// # Log Level
/// `warn!`
pub struct HookFailed<'a> {
    pub component: &'a str,
    pub event: &'a str,
    pub reason: &'a str,
}

impl Display for HookFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Hook for '{}' on {} failed: {}",
            self.component, self.event, self.reason
        )
    }
}

/// The limitor cut the snapshot down.
///
/// # Log Level
/// `info!`
pub struct RecordsLimited {
    pub before: usize,
    pub after: usize,
    pub limit: usize,
}

impl Display for RecordsLimited {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.limit == 0 {
            write!(f, "No limit set, keeping all {} records", self.before)
        } else {
            write!(
                f,
                "Limited {} records to {} (limit={})",
                self.before, self.after, self.limit
            )
        }
    }
}
