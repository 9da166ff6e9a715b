// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the staged snapshot storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode snapshot {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },
    #[error("Failed to encode snapshot {}: {message}", path.display())]
    Encode { path: PathBuf, message: String },
    #[error("Unsupported snapshot format '{0}'")]
    UnsupportedFormat(String),
    /// The output column of a stage already exists in the snapshot it reads
    #[error("Column '{key}' already exists in the snapshot")]
    KeyCollision { key: String },
    /// The input column of a stage is absent from the snapshot it reads
    #[error("Column '{key}' not found in the snapshot")]
    MissingColumn { key: String },
    /// A write at step -1 would land on the original input
    #[error("Refusing to overwrite the original input {}; call step() before write()", path.display())]
    ProtectedInput { path: PathBuf },
    #[error("No snapshot for step {step} at {}", path.display())]
    MissingSnapshot { step: i64, path: PathBuf },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}
