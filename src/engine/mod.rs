// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Lifecycle runtime for operators, pipelines and frameworks.
//!
//! Business logic lives behind the traits in [`crate::traits`]; this module
//! wraps it with state machines, hooks, metrics and the bounded worker pool
//! that fans a stage out over its records.

pub mod framework;
pub mod hooks;
pub mod operator;
pub mod pipeline;
pub mod pool;
pub mod state;

pub use framework::{
    Framework, FrameworkContext, FrameworkControl, FrameworkInfo, FrameworkMetrics,
    FrameworkProgress, StageRecord,
};
pub use hooks::{FrameworkEvent, Hook, HookContext, HookEvent, Hooks, LifecycleEvent};
pub use operator::{ManagedOperator, OperatorInfo, OperatorMetrics};
pub use pipeline::{Pipeline, PipelineInfo, PipelineMetrics, RecordFailurePolicy};
pub use pool::{ordered_map, ordered_map_blocking};
pub use state::{FrameworkState, OperatorState, PipelineState};
