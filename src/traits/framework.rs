// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::FrameworkContext;
use crate::errors::Result;
use crate::traits::Lang;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameworkType {
    Pretraining,
    Sft,
    Cot,
    Multimodal,
    Custom,
}

impl fmt::Display for FrameworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FrameworkType::Pretraining => "pretraining",
            FrameworkType::Sft => "sft",
            FrameworkType::Cot => "cot",
            FrameworkType::Multimodal => "multimodal",
            FrameworkType::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// The parts of a framework that vary between corpus kinds.
///
/// [`crate::engine::Framework`] owns the lifecycle and calls these in order:
/// `on_init` once at construction, `prepare_components` from `prepare()`,
/// and `execute_pipeline` from `run()`.
#[async_trait]
pub trait FrameworkBlueprint: Send + Sync + 'static {
    const FRAMEWORK_TYPE: FrameworkType;
    const VERSION: &'static str;
    const REQUIRED_OPERATORS: &'static [&'static str];
    const REQUIRED_PIPELINES: &'static [&'static str];

    /// What a successful run returns.
    type Report: Serialize + Send;

    fn name(&self) -> &str;

    fn description(&self, lang: Lang) -> String;

    fn on_init(&mut self, _ctx: &mut FrameworkContext) -> Result<()> {
        Ok(())
    }

    /// Build every operator and pipeline the run needs and add them to `ctx`.
    fn prepare_components(&mut self, ctx: &mut FrameworkContext) -> Result<()>;

    /// Run the stages in order, threading each returned key into the next.
    async fn execute_pipeline(&mut self, ctx: &mut FrameworkContext) -> Result<Self::Report>;
}
