// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Versioned tabular snapshots threaded between stages.
//!
//! A [`FileStorage`] starts at step -1. Steps -1 and 0 address the original
//! input file; every `write()` persists `operator_step + 1` as a new snapshot
//! in the cache directory, so a stage calls `step()`, reads, transforms and
//! writes, and the next stage finds the result one step further on.

mod file_storage;
mod format;
mod table;

pub use file_storage::{FileMetadata, FileStorage, StorageStats};
pub use format::SnapshotFormat;
pub use table::{text_value, Record, Table};
