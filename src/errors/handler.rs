// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use super::{CorpusError, ErrorInfo, ErrorReporter, Result, RetryPolicy};

/// Free-form key/value context attached to a handled error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext(BTreeMap<String, String>);

impl ErrorContext {
    pub fn new(operation: &str) -> Self {
        let mut map = BTreeMap::new();
        map.insert("operation".to_string(), operation.to_string());
        Self(map)
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    pub fn operation(&self) -> &str {
        self.0.get("operation").map(String::as_str).unwrap_or("unknown")
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

/// Shared error-handling context.
///
/// Cloning is cheap: every clone reports into the same [`ErrorReporter`], which
/// is how one reporter created at startup aggregates errors for the whole run.
/// Components receive a handler at construction instead of reaching for a
/// global.
#[derive(Debug, Clone, Default)]
pub struct ErrorHandler {
    reporter: Arc<ErrorReporter>,
    retry_policy: RetryPolicy,
}

impl ErrorHandler {
    pub fn new(reporter: Arc<ErrorReporter>, retry_policy: RetryPolicy) -> Self {
        Self {
            reporter,
            retry_policy,
        }
    }

    pub fn reporter(&self) -> &Arc<ErrorReporter> {
        &self.reporter
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Classify, log and record an error.
    pub fn handle(&self, error: &CorpusError, context: ErrorContext) -> ErrorInfo {
        let info = ErrorInfo::from_error(error, context.into_inner());
        self.reporter.report(info.clone());
        info
    }

    /// Report a failure and hand it back unchanged for the caller to `?`.
    pub fn propagate<T>(&self, result: Result<T>, context: ErrorContext) -> Result<T> {
        if let Err(e) = &result {
            self.handle(e, context);
        }
        result
    }

    /// Run `f`, reporting any failure and returning it as an [`ErrorInfo`].
    ///
    /// The caller decides between propagating and substituting a fallback.
    pub fn safe_execute<T, F>(&self, context: ErrorContext, f: F) -> std::result::Result<T, ErrorInfo>
    where
        F: FnOnce() -> Result<T>,
    {
        f().map_err(|e| self.handle(&e, context))
    }

    /// Run `f`, reporting any failure and returning `fallback` in its place.
    pub fn safe_execute_or<T, F>(&self, context: ErrorContext, fallback: T, f: F) -> T
    where
        F: FnOnce() -> Result<T>,
    {
        self.safe_execute(context, f).unwrap_or(fallback)
    }

    /// Retry `f` under this handler's policy, reporting the final failure.
    pub async fn retry<T, F, Fut>(&self, context: ErrorContext, f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let (result, retries) = self.retry_policy.retry_counted(context.operation(), f).await;
        if let Err(e) = &result {
            let info = ErrorInfo::from_error(e, context.into_inner()).with_retry_count(retries);
            self.reporter.report(info);
        }
        result
    }

    /// Blocking counterpart of [`ErrorHandler::retry`].
    pub fn retry_blocking<T, F>(&self, context: ErrorContext, f: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let (result, retries) = self.retry_policy.retry_blocking(context.operation(), f);
        if let Err(e) = &result {
            let info = ErrorInfo::from_error(e, context.into_inner()).with_retry_count(retries);
            self.reporter.report(info);
        }
        result
    }
}
