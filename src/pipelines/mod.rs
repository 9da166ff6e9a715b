// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod cleaning;

pub use cleaning::CleaningPipeline;
