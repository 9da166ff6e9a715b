// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The config file was read but could not be deserialized
    #[error("Failed to parse config {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    /// The config file extension maps to no known format
    #[error("Unsupported config format '{0}' (expected .yaml, .yml or .toml)")]
    UnsupportedFormat(String),
    /// A single field holds a value outside its allowed range
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
    /// One or more validation rules failed
    #[error("Configuration validation failed:\n{}", problems.join("\n"))]
    Validation { problems: Vec<String> },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
