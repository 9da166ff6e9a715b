// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::{ConfigMap, Registry};
use crate::errors::Result;
use crate::traits::{Describe, TextOperator};

/// Decides which text operators a pipeline applies, and in what order.
///
/// Called exactly once, when the pipeline is built. The returned list is
/// fixed for the lifetime of the pipeline.
pub trait PipelineBlueprint: Describe {
    fn configure_operators(
        &self,
        config: &ConfigMap,
        micro_ops: &Registry<Box<dyn TextOperator>>,
    ) -> Result<Vec<Box<dyn TextOperator>>>;
}
