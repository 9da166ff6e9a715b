// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod execution;
mod handler;
mod info;
mod registry;
mod reporter;
mod retry;
mod storage;

pub use config::ConfigError;
pub use execution::{CorpusError, Result};
pub use handler::{ErrorContext, ErrorHandler};
pub use info::{ErrorCategory, ErrorInfo, ErrorSeverity};
pub use registry::RegistryError;
pub use reporter::{ErrorFrequency, ErrorReporter, ErrorSummary};
pub use retry::RetryPolicy;
pub use storage::StorageError;
