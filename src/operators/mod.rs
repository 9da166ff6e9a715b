// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Built-in operators.
//!
//! [`microops`] holds the per-record regex cleaners used inside pipelines.
//! The remaining modules are whole-stage operators run directly by a
//! framework.

pub mod limitor;
pub mod llm_cleaner;
pub mod microops;
pub mod text_splitter;

pub use limitor::Limitor;
pub use llm_cleaner::LlmCleaner;
pub use text_splitter::TextSplitter;
