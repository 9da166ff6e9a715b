// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod framework;
pub mod operator;
pub mod pipeline;

pub use framework::{FrameworkBlueprint, FrameworkType};
pub use operator::{Describe, Lang, StageOperator, TextOperator};
pub use pipeline::PipelineBlueprint;
