// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors raised by registry lookups and registrations.
///
/// A lookup failure is a configuration problem: callers treat it as fatal
/// and never retry it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("No object named '{name}' found in '{registry}' registry")]
    NotFound { name: String, registry: String },
    #[error("Invalid registration in '{registry}' registry: {reason}")]
    InvalidRegistration { registry: String, reason: String },
}
