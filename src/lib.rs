// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod config;     // settings + registries
pub mod engine;     // lifecycle runtime
pub mod errors;     // error handling
pub mod frameworks; // concrete corpus frameworks
pub mod llm;        // completion client + token accounting
pub mod observability;
pub mod operators;  // stage operators and micro-operations
pub mod pipelines;
pub mod storage;    // step snapshots
pub mod text;       // tokenizers + chunking
pub mod traits;     // unified abstractions
