// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for record-level pipeline execution.

use crate::errors::CorpusError;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A pipeline is about to process a snapshot.
///
/// # Log Level
/// `info!`
///
/// # Example
/// ```
/// use the_corpusmill::observability::messages::pipeline::PipelineStarted;
///
/// let msg = PipelineStarted {
///     pipeline: "cleaning_pipe",
///     input_key: "raw_content",
///     output_key: "step2_content",
///     records: 1_000,
///     operators: 4,
///     max_workers: 8,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct PipelineStarted<'a> {
    pub pipeline: &'a str,
    pub input_key: &'a str,
    pub output_key: &'a str,
    pub records: usize,
    pub operators: usize,
    pub max_workers: usize,
}

impl Display for PipelineStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline '{}' processing {} records through {} operators ({} -> {}, max_workers={})",
            self.pipeline,
            self.records,
            self.operators,
            self.input_key,
            self.output_key,
            self.max_workers
        )
    }
}

impl StructuredLog for PipelineStarted<'_> {
    fn log(&self) {
        tracing::info!(
            pipeline = self.pipeline,
            records = self.records,
            operators = self.operators,
            max_workers = self.max_workers,
            "{}",
            self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "pipeline",
            span_name = name,
            pipeline = self.pipeline,
            output_key = self.output_key,
        )
    }
}

/// # Log Level
/// `info!`, or `warn!` when any record failed
pub struct PipelineCompleted<'a> {
    pub pipeline: &'a str,
    pub records: usize,
    pub failed_records: usize,
    pub elapsed: Duration,
}

impl Display for PipelineCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline '{}' processed {} records in {:.2}s ({} degraded)",
            self.pipeline,
            self.records,
            self.elapsed.as_secs_f64(),
            self.failed_records
        )
    }
}

/// A record kept its original text because an operator failed on it.
///
/// # Log Level
/// `warn!`
pub struct RecordReverted<'a> {
    pub pipeline: &'a str,
    pub row: usize,
    pub operator: &'a str,
    pub error: &'a CorpusError,
}

impl Display for RecordReverted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline '{}' row {}: operator '{}' failed ({}), keeping original text",
            self.pipeline, self.row, self.operator, self.error
        )
    }
}

/// An operator failed on a record and was skipped for it.
///
/// # Log Level
/// `warn!`
pub struct OperatorSkipped<'a> {
    pub pipeline: &'a str,
    pub row: usize,
    pub operator: &'a str,
    pub error: &'a CorpusError,
}

impl Display for OperatorSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline '{}' row {}: skipping operator '{}' ({})",
            self.pipeline, self.row, self.operator, self.error
        )
    }
}
