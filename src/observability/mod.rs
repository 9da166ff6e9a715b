// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Every diagnostic and operational log line in the crate is produced from a
//! message struct that implements `Display`. Call sites never format log text
//! themselves:
//!
//! ```rust
//! use the_corpusmill::observability::messages::storage::SnapshotWritten;
//! use std::path::Path;
//!
//! let msg = SnapshotWritten {
//!     step: 2,
//!     path: Path::new("/tmp/cache/corpusmill_cache_step_2.jsonl"),
//!     records: 120,
//!     bytes: 48_213,
//! };
//!
//! tracing::info!("{}", msg);
//! ```
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::registry` - registration, lookup and lazy loading
//! * `messages::errors` - error reports and retries
//! * `messages::storage` - snapshot reads, writes and cleanup
//! * `messages::operator` - managed operator lifecycle
//! * `messages::pipeline` - record-level pipeline execution
//! * `messages::framework` - staged runs and control requests
//! * `messages::llm` - remote model calls and token accounting
//! * `messages::text` - tokenization and chunking

pub mod messages;
