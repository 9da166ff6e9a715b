// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for staged framework runs.
//!
//! This module contains message types for logging events related to:
//! * Framework construction, preparation and completion
//! * Stage boundaries within a run
//! * Pause, resume and stop requests
//! * Raw corpus preprocessing

use crate::engine::FrameworkState;
use crate::errors::CorpusError;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;
use tracing::Span;

/// # Log Level
/// `info!`
pub struct FrameworkInitialized<'a> {
    pub framework: &'a str,
    pub version: &'a str,
    pub input: &'a Path,
    pub output_dir: &'a Path,
}

impl Display for FrameworkInitialized<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Initialized {} v{}: input={}, output_dir={}",
            self.framework,
            self.version,
            self.input.display(),
            self.output_dir.display()
        )
    }
}

/// # Log Level
/// `info!`
pub struct FrameworkPrepared<'a> {
    pub framework: &'a str,
    pub operators: usize,
    pub pipelines: usize,
}

impl Display for FrameworkPrepared<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} prepared with {} operators and {} pipelines",
            self.framework, self.operators, self.pipelines
        )
    }
}

/// A run is starting.
///
/// # Log Level
/// `info!`
pub struct FrameworkStarted<'a> {
    pub framework: &'a str,
    pub framework_type: &'a str,
    pub max_workers: usize,
    pub limit: usize,
}

impl Display for FrameworkStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting {} ({}) run: max_workers={}, limit={}",
            self.framework, self.framework_type, self.max_workers, self.limit
        )
    }
}

impl StructuredLog for FrameworkStarted<'_> {
    fn log(&self) {
        tracing::info!(
            framework = self.framework,
            framework_type = self.framework_type,
            max_workers = self.max_workers,
            limit = self.limit,
            "{}",
            self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "framework",
            span_name = name,
            framework = self.framework,
            framework_type = self.framework_type,
        )
    }
}

/// # Log Level
/// `info!`
pub struct FrameworkCompleted<'a> {
    pub framework: &'a str,
    pub stages: u64,
    pub elapsed: Duration,
}

impl Display for FrameworkCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} completed {} stages in {:.2}s",
            self.framework,
            self.stages,
            self.elapsed.as_secs_f64()
        )
    }
}

/// # Log Level
/// `error!`
pub struct FrameworkFailed<'a> {
    pub framework: &'a str,
    pub phase: &'a str,
    pub error: &'a CorpusError,
}

impl Display for FrameworkFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} failed during {}: {}",
            self.framework, self.phase, self.error
        )
    }
}

/// A stage is about to read its snapshot.
///
/// # Log Level
/// `info!`
pub struct StageStarted<'a> {
    pub framework: &'a str,
    pub stage: &'a str,
    pub step: i64,
    pub input_key: &'a str,
}

impl Display for StageStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}: stage '{}' at step {} reading '{}'",
            self.framework, self.stage, self.step, self.input_key
        )
    }
}

impl StructuredLog for StageStarted<'_> {
    fn log(&self) {
        tracing::info!(
            framework = self.framework,
            stage = self.stage,
            step = self.step,
            input_key = self.input_key,
            "{}",
            self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "stage",
            span_name = name,
            stage = self.stage,
            step = self.step,
        )
    }
}

/// # Log Level
/// `info!`
pub struct StageCompleted<'a> {
    pub framework: &'a str,
    pub stage: &'a str,
    pub output_key: &'a str,
    pub elapsed: Duration,
}

impl Display for StageCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}: stage '{}' wrote '{}' in {:.2}s",
            self.framework,
            self.stage,
            self.output_key,
            self.elapsed.as_secs_f64()
        )
    }
}

/// `pause()`, `resume()` or `stop()` changed the advertised state.
///
/// # Log Level
/// `info!`
pub struct FrameworkControlRequested<'a> {
    pub framework: &'a str,
    pub action: &'a str,
    pub state: FrameworkState,
}

impl Display for FrameworkControlRequested<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}: {} requested, state is now {}",
            self.framework, self.action, self.state
        )
    }
}

/// A directory input was flattened into one tabular file.
///
/// # Log Level
/// `info!`
pub struct RawCorpusPreprocessed<'a> {
    pub files: usize,
    pub skipped: usize,
    pub output: &'a Path,
}

impl Display for RawCorpusPreprocessed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Preprocessed {} raw corpus files ({} skipped) into {}",
            self.files,
            self.skipped,
            self.output.display()
        )
    }
}

/// A raw corpus file could not be read and was left out.
///
/// # Log Level
/// `warn!`
pub struct RawCorpusFileSkipped<'a> {
    pub path: &'a Path,
    pub reason: &'a str,
}

impl Display for RawCorpusFileSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Skipping raw corpus file {}: {}",
            self.path.display(),
            self.reason
        )
    }
}
