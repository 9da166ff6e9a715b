// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::CorpusError;
use std::fmt::{Display, Formatter};

/// One record's cleaning request failed; the record becomes null.
///
/// # Log Level
/// `warn!`
pub struct LlmRequestFailed<'a> {
    pub model: &'a str,
    pub row: usize,
    pub error: &'a CorpusError,
}

impl Display for LlmRequestFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "LLM request to '{}' failed for row {}: {}",
            self.model, self.row, self.error
        )
    }
}

/// # Log Level
/// `info!`
pub struct LlmCleaningStarted<'a> {
    pub model: &'a str,
    pub records: usize,
    pub skipped_empty: usize,
    pub max_workers: usize,
}

impl Display for LlmCleaningStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Cleaning {} records with '{}' ({} empty skipped, {} workers)",
            self.records, self.model, self.skipped_empty, self.max_workers
        )
    }
}

/// # Log Level
/// `info!`
pub struct LlmCleaningCompleted {
    pub cleaned: usize,
    pub failed: usize,
    pub requests: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Display for LlmCleaningCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "LLM cleaning finished: {} cleaned, {} failed, {} requests, {} input tokens, {} output tokens",
            self.cleaned, self.failed, self.requests, self.input_tokens, self.output_tokens
        )
    }
}
