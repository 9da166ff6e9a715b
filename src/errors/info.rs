// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::CorpusError;

/// How bad a handled error is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Low => "low",
            ErrorSeverity::Medium => "medium",
            ErrorSeverity::High => "high",
            ErrorSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which part of the world a handled error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    System,
    Network,
    Data,
    Logic,
    Config,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::System => "system",
            ErrorCategory::Network => "network",
            ErrorCategory::Data => "data",
            ErrorCategory::Logic => "logic",
            ErrorCategory::Config => "config",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one handled error.
///
/// Created once per handled error and kept by the [`super::ErrorReporter`].
/// Only `resolved` ever changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    pub error_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub severity: ErrorSeverity,
    pub category: ErrorCategory,
    pub exception_type: String,
    pub message: String,
    pub context: BTreeMap<String, String>,
    pub retry_count: u32,
    pub resolved: bool,
}

impl ErrorInfo {
    /// Build a record with automatic classification.
    pub fn from_error(error: &CorpusError, context: BTreeMap<String, String>) -> Self {
        let (severity, category) = error.classify();
        Self {
            error_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            severity,
            category,
            exception_type: error.kind_name().to_string(),
            message: error.to_string(),
            context,
            retry_count: 0,
            resolved: false,
        }
    }

    /// Override the automatic classification.
    pub fn with_classification(mut self, severity: ErrorSeverity, category: ErrorCategory) -> Self {
        self.severity = severity;
        self.category = category;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Key used to count repeated occurrences of the same failure.
    pub fn frequency_key(&self) -> String {
        format!("{}:{}", self.exception_type, self.message)
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}/{} {}: {}",
            self.error_id, self.severity, self.category, self.exception_type, self.message
        )
    }
}
