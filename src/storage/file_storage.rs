// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::runtime::{Handle, RuntimeFlavor};

use super::{SnapshotFormat, Table};
use crate::config::StorageSettings;
use crate::errors::{CorpusError, ErrorContext, ErrorHandler, Result, StorageError};
use crate::observability::messages::storage::{
    IntegrityCheckFailed, SnapshotRead, SnapshotRemoved, SnapshotWritten, StorageStepAdvanced,
};

/// What is known about one written snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileMetadata {
    pub path: PathBuf,
    pub record_count: usize,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
    pub compressed: bool,
}

/// Totals over every snapshot written during the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageStats {
    pub current_step: i64,
    pub cache_path: PathBuf,
    pub cache_type: SnapshotFormat,
    pub compression_enabled: bool,
    pub total_files: usize,
    pub total_records: usize,
    pub total_size_bytes: u64,
}

/// Step-addressed snapshot files in one cache directory.
///
/// `operator_step` starts at -1. [`FileStorage::read`] loads the snapshot of
/// the current step, with steps -1 and 0 both addressing the original input
/// (the first stage reads it after its `step()`). [`FileStorage::write`]
/// always persists `operator_step + 1`; a write that would land on the
/// original input is refused, so the input is never overwritten or deleted.
///
/// Only the orchestrating task touches the step counter.
#[derive(Debug)]
pub struct FileStorage {
    first_entry_file: PathBuf,
    cache_path: PathBuf,
    file_name_prefix: String,
    format: SnapshotFormat,
    compression: bool,
    validate_on_write: bool,
    operator_step: i64,
    file_metadata: BTreeMap<i64, FileMetadata>,
    error_handler: ErrorHandler,
}

impl FileStorage {
    /// Storage over `first_entry_file` writing snapshots into `cache_path`,
    /// which is created if needed.
    pub fn new(
        first_entry_file: impl Into<PathBuf>,
        cache_path: impl Into<PathBuf>,
        settings: &StorageSettings,
        error_handler: ErrorHandler,
    ) -> Result<Self> {
        if !settings.cache_type.is_supported() {
            return Err(StorageError::UnsupportedFormat(settings.cache_type.to_string()).into());
        }

        let cache_path = cache_path.into();
        fs::create_dir_all(&cache_path).map_err(|e| StorageError::io(&cache_path, e))?;

        Ok(Self {
            first_entry_file: first_entry_file.into(),
            cache_path,
            file_name_prefix: settings.file_name_prefix.clone(),
            format: settings.cache_type,
            compression: settings.enable_compression,
            validate_on_write: settings.validate_on_write,
            operator_step: -1,
            file_metadata: BTreeMap::new(),
            error_handler,
        })
    }

    pub fn input_file(&self) -> &Path {
        &self.first_entry_file
    }

    /// Point step 0 at a different original input, e.g. a preprocessed corpus.
    pub fn set_input_file(&mut self, path: impl Into<PathBuf>) {
        self.first_entry_file = path.into();
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn format(&self) -> SnapshotFormat {
        self.format
    }

    pub fn operator_step(&self) -> i64 {
        self.operator_step
    }

    /// Output key a stage uses when its caller names none.
    pub fn default_output_key(&self) -> String {
        format!("step{}_content", self.operator_step + 1)
    }

    /// Advance to the next stage. Returns `self` so a stage can be called as
    /// `stage.run(storage.step(), ...)`.
    pub fn step(&mut self) -> &mut Self {
        self.operator_step += 1;
        tracing::debug!(
            "{}",
            StorageStepAdvanced {
                step: self.operator_step
            }
        );
        self
    }

    /// Back to step -1, forgetting written snapshots (files stay on disk).
    pub fn reset(&mut self) -> &mut Self {
        self.operator_step = -1;
        self.file_metadata.clear();
        self
    }

    /// File addressed by `step`. Steps at or below 0 are the original input.
    pub fn snapshot_path(&self, step: i64) -> PathBuf {
        if step <= 0 {
            return self.first_entry_file.clone();
        }
        let mut name = format!(
            "{}_{}.{}",
            self.file_name_prefix,
            step,
            self.format.extension()
        );
        if self.format.uses_gzip(self.compression) {
            name.push_str(".gz");
        }
        self.cache_path.join(name)
    }

    /// Load the snapshot of the current step. Transient I/O failures are
    /// retried under the handler's policy.
    pub fn read(&self) -> Result<Table> {
        let step = self.operator_step;
        let path = self.snapshot_path(step);
        if !path.is_file() {
            let error: CorpusError = if step <= 0 {
                CorpusError::InputNotFound(path)
            } else {
                StorageError::MissingSnapshot { step, path }.into()
            };
            return self
                .error_handler
                .propagate(Err(error), ErrorContext::new("storage_read").with("step", step));
        }

        let (format, gzipped) = if step <= 0 {
            SnapshotFormat::detect(&path)?
        } else {
            (self.format, self.format.uses_gzip(self.compression))
        };

        let context = ErrorContext::new("storage_read")
            .with("step", step)
            .with("path", path.display());
        let table = off_worker(|| {
            self.error_handler
                .retry_blocking(context, || format.read(&path, gzipped).map_err(CorpusError::from))
        })?;

        tracing::info!(
            "{}",
            SnapshotRead {
                step,
                path: &path,
                records: table.len(),
            }
        );
        Ok(table)
    }

    /// Persist `table` as the snapshot of `operator_step + 1`.
    pub fn write(&mut self, table: &Table) -> Result<PathBuf> {
        let target_step = self.operator_step + 1;
        let path = self.snapshot_path(target_step);
        if target_step <= 0 {
            return Err(StorageError::ProtectedInput { path }.into());
        }

        let context = ErrorContext::new("storage_write")
            .with("step", target_step)
            .with("path", path.display());
        let format = self.format;
        let compression = self.compression;
        let handler = &self.error_handler;
        let file_size = off_worker(|| {
            handler.retry_blocking(context, || {
                format
                    .write(table, &path, compression)
                    .map_err(CorpusError::from)
            })
        })?;

        self.file_metadata.insert(
            target_step,
            FileMetadata {
                path: path.clone(),
                record_count: table.len(),
                file_size,
                created_at: Utc::now(),
                compressed: compression,
            },
        );

        tracing::info!(
            "{}",
            SnapshotWritten {
                step: target_step,
                path: &path,
                records: table.len(),
                bytes: file_size,
            }
        );

        if self.validate_on_write {
            self.validate_integrity(&path);
        }
        Ok(path)
    }

    /// Re-read a written snapshot and confirm it is non-empty. Problems are
    /// logged, never raised.
    pub fn validate_integrity(&self, path: &Path) -> bool {
        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            tracing::warn!(
                "{}",
                IntegrityCheckFailed {
                    path,
                    reason: "file is empty",
                }
            );
            return false;
        }

        let gzipped = self.format.uses_gzip(self.compression);
        match self.format.read(path, gzipped) {
            Ok(table) if table.is_empty() => {
                tracing::warn!(
                    "{}",
                    IntegrityCheckFailed {
                        path,
                        reason: "snapshot holds no records",
                    }
                );
                false
            }
            Ok(_) => true,
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(
                    "{}",
                    IntegrityCheckFailed {
                        path,
                        reason: &reason,
                    }
                );
                false
            }
        }
    }

    /// Metadata of the snapshot written for `step`, or for the current step.
    pub fn get_file_info(&self, step: Option<i64>) -> Option<&FileMetadata> {
        self.file_metadata.get(&step.unwrap_or(self.operator_step))
    }

    /// Delete snapshots older than the last `keep_steps` steps. The original
    /// input is never touched. Returns how many files were removed.
    pub fn cleanup_cache(&mut self, keep_steps: usize) -> usize {
        let keep_from = self.operator_step - keep_steps as i64;
        let mut removed = 0;

        for step in 1..keep_from.max(1) {
            let path = self.snapshot_path(step);
            if !path.exists() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    removed += 1;
                    self.file_metadata.remove(&step);
                    tracing::info!("{}", SnapshotRemoved { step, path: &path });
                }
                Err(e) => {
                    let context = ErrorContext::new("cleanup_cache")
                        .with("step", step)
                        .with("keep_steps", keep_steps);
                    self.error_handler.handle(&CorpusError::io(&path, e), context);
                }
            }
        }
        removed
    }

    pub fn get_storage_stats(&self) -> StorageStats {
        StorageStats {
            current_step: self.operator_step,
            cache_path: self.cache_path.clone(),
            cache_type: self.format,
            compression_enabled: self.compression,
            total_files: self.file_metadata.len(),
            total_records: self.file_metadata.values().map(|m| m.record_count).sum(),
            total_size_bytes: self.file_metadata.values().map(|m| m.file_size).sum(),
        }
    }
}

/// Run blocking snapshot I/O (and its retry backoff) without stalling the
/// other tasks of a multi-threaded runtime. On a current-thread runtime or
/// outside tokio `f` simply runs in place.
fn off_worker<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}
