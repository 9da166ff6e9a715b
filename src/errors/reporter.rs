// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

use super::{ErrorInfo, ErrorSeverity};
use crate::observability::messages::errors::ErrorReported;

const MOST_FREQUENT_LIMIT: usize = 10;
const RECENT_LIMIT: usize = 5;

/// How often one kind of failure was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorFrequency {
    pub key: String,
    pub count: usize,
}

/// Diagnostic summary over every error reported so far.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorSummary {
    pub total_errors: usize,
    pub severity_distribution: BTreeMap<String, usize>,
    pub category_distribution: BTreeMap<String, usize>,
    pub most_frequent_errors: Vec<ErrorFrequency>,
    pub recent_errors: Vec<ErrorInfo>,
}

#[derive(Debug, Default)]
struct ReporterState {
    errors: Vec<ErrorInfo>,
    counts: HashMap<String, usize>,
}

/// Process-wide accumulator of [`ErrorInfo`] records.
///
/// One instance is created at startup and shared (through
/// [`super::ErrorHandler`]) by every component. Reporting never changes
/// control flow; it only logs and remembers.
#[derive(Debug, Default)]
pub struct ErrorReporter {
    state: Mutex<ReporterState>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and store a handled error.
    pub fn report(&self, info: ErrorInfo) {
        let msg = ErrorReported { info: &info };
        match info.severity {
            ErrorSeverity::Critical | ErrorSeverity::High => tracing::error!("{}", msg),
            ErrorSeverity::Medium => tracing::warn!("{}", msg),
            ErrorSeverity::Low => tracing::info!("{}", msg),
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state.counts.entry(info.frequency_key()).or_insert(0) += 1;
        state.errors.push(info);
    }

    /// Flag a previously reported error as resolved. Returns false for unknown ids.
    pub fn mark_resolved(&self, error_id: Uuid) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.errors.iter_mut().find(|e| e.error_id == error_id) {
            Some(info) => {
                info.resolved = true;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .errors
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.errors.clear();
        state.counts.clear();
    }

    pub fn summary(&self) -> ErrorSummary {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let mut severity_distribution = BTreeMap::new();
        let mut category_distribution = BTreeMap::new();
        for info in &state.errors {
            *severity_distribution
                .entry(info.severity.as_str().to_string())
                .or_insert(0) += 1;
            *category_distribution
                .entry(info.category.as_str().to_string())
                .or_insert(0) += 1;
        }

        let mut most_frequent_errors: Vec<ErrorFrequency> = state
            .counts
            .iter()
            .map(|(key, count)| ErrorFrequency {
                key: key.clone(),
                count: *count,
            })
            .collect();
        // Ties broken by key so the summary is stable
        most_frequent_errors.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        most_frequent_errors.truncate(MOST_FREQUENT_LIMIT);

        let recent_start = state.errors.len().saturating_sub(RECENT_LIMIT);
        let recent_errors = state.errors[recent_start..].to_vec();

        ErrorSummary {
            total_errors: state.errors.len(),
            severity_distribution,
            category_distribution,
            most_frequent_errors,
            recent_errors,
        }
    }
}
