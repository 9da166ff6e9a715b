// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for tokenization and chunking.

use std::fmt::{Display, Formatter};
use std::path::Path;

/// A `tokenizer.json` was loaded.
///
/// # Log Level
/// `info!`
pub struct TokenizerLoaded<'a> {
    pub path: &'a Path,
    pub model_max_length: usize,
}

impl Display for TokenizerLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Loaded tokenizer from {} (model_max_length={})",
            self.path.display(),
            self.model_max_length
        )
    }
}

/// Token counting fell back to whitespace splitting.
///
/// # Log Level
/// `warn!` - Counts are estimates from here on
pub struct TokenizerFallback<'a> {
    pub reason: &'a str,
}

impl Display for TokenizerFallback<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Tokenizer unavailable, estimating tokens by whitespace: {}",
            self.reason
        )
    }
}

/// A document longer than the tokenizer's limit was cut into even word pieces.
///
/// # Log Level
/// `debug!`
pub struct DocumentPartitioned {
    pub tokens: usize,
    pub max_tokens: usize,
    pub pieces: usize,
}

impl Display for DocumentPartitioned {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Document of {} tokens exceeds {} tokens, partitioned into {} pieces",
            self.tokens, self.max_tokens, self.pieces
        )
    }
}

/// One document was chunked.
///
/// # Log Level
/// `debug!`
pub struct DocumentChunked<'a> {
    pub method: &'a str,
    pub tokens: usize,
    pub chunks: usize,
    pub short_chunks: usize,
}

impl Display for DocumentChunked<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Split {} tokens into {} chunks using {} ({} below the minimum)",
            self.tokens, self.chunks, self.method, self.short_chunks
        )
    }
}

/// A whole snapshot was split into chunk rows.
///
/// # Log Level
/// `info!`
pub struct TextSplitCompleted<'a> {
    pub method: &'a str,
    pub records: usize,
    pub chunks: usize,
    pub output_key: &'a str,
}

impl Display for TextSplitCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Split {} records into {} chunks with {} (output key '{}')",
            self.records, self.chunks, self.method, self.output_key
        )
    }
}
