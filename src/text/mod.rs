// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Token accounting and adaptive chunking.

pub mod chunking;
pub mod tokenizer;

pub use chunking::{AdaptiveChunker, Chunk, ShortChunkPolicy, SplitMethod};
pub use tokenizer::{
    count_tokens, load_tokenizer, whitespace_count, HfTokenizer, Tokenizer, WhitespaceTokenizer,
};
