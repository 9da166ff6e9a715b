// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for the human-readable line. Types
//! that mark the start of a unit of work also implement [`StructuredLog`],
//! which emits the same line with its fields attached and opens a matching
//! span.

use tracing::Span;

pub mod errors;
pub mod framework;
pub mod llm;
pub mod operator;
pub mod pipeline;
pub mod registry;
pub mod storage;
pub mod text;

/// A message that can log itself with structured fields.
pub trait StructuredLog {
    /// Emit the message at its documented level.
    fn log(&self);

    /// A span carrying the message's fields, for instrumenting the work it
    /// announces.
    fn span(&self, name: &str) -> Span;
}
