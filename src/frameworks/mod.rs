// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Concrete corpus frameworks.

pub mod pretraining;
pub mod raw_corpus;

pub use pretraining::{PretrainingFramework, PretrainingReport, StageOutput};
pub use raw_corpus::RawCorpusSummary;
