// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for step-addressed snapshot storage.

use std::fmt::{Display, Formatter};
use std::path::Path;

/// The storage step counter moved forward.
///
/// # Log Level
/// `debug!`
pub struct StorageStepAdvanced {
    pub step: i64,
}

impl Display for StorageStepAdvanced {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Storage advanced to step {}", self.step)
    }
}

/// A snapshot was loaded.
///
/// # Log Level
/// `info!`
pub struct SnapshotRead<'a> {
    pub step: i64,
    pub path: &'a Path,
    pub records: usize,
}

impl Display for SnapshotRead<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Read {} records for step {} from {}",
            self.records,
            self.step,
            self.path.display()
        )
    }
}

/// A snapshot was persisted.
///
/// # Log Level
/// `info!`
///
/// # Example
/// ```
/// use the_corpusmill::observability::messages::storage::SnapshotWritten;
/// use std::path::Path;
///
/// let msg = SnapshotWritten {
///     step: 1,
///     path: Path::new("cache/corpusmill_cache_step_1.jsonl"),
///     records: 3,
///     bytes: 120,
/// };
/// assert!(msg.to_string().starts_with("Wrote 3 records (120 bytes)"));
/// ```
pub struct SnapshotWritten<'a> {
    pub step: i64,
    pub path: &'a Path,
    pub records: usize,
    pub bytes: u64,
}

impl Display for SnapshotWritten<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Wrote {} records ({} bytes) for step {} to {}",
            self.records,
            self.bytes,
            self.step,
            self.path.display()
        )
    }
}

/// A written snapshot did not survive re-reading intact.
///
/// # Log Level
/// `warn!` - The run continues
pub struct IntegrityCheckFailed<'a> {
    pub path: &'a Path,
    pub reason: &'a str,
}

impl Display for IntegrityCheckFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Integrity check failed for {}: {}",
            self.path.display(),
            self.reason
        )
    }
}

/// An old snapshot was deleted by cache cleanup.
///
/// # Log Level
/// `info!`
pub struct SnapshotRemoved<'a> {
    pub step: i64,
    pub path: &'a Path,
}

impl Display for SnapshotRemoved<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Removed cached snapshot for step {}: {}",
            self.step,
            self.path.display()
        )
    }
}
