// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Serialize;
use std::fmt;

/// Lifecycle of an operator.
///
/// `Initialized → Configured → Running → {Completed | Failed}`, with
/// `Running → Stopped` on an external request and any state back to
/// `Initialized` through `reset()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorState {
    Initialized,
    Configured,
    Running,
    Completed,
    Failed,
    Stopped,
}

/// Pipelines share the operator lifecycle but never resume from `Stopped`.
pub type PipelineState = OperatorState;

impl OperatorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorState::Initialized => "initialized",
            OperatorState::Configured => "configured",
            OperatorState::Running => "running",
            OperatorState::Completed => "completed",
            OperatorState::Failed => "failed",
            OperatorState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for OperatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a framework run.
///
/// `Initialized → Preparing → Configured → Running → {Completed | Failed}`,
/// `Running ⇄ Paused`, and any state to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameworkState {
    Initialized,
    Configured,
    Preparing,
    Running,
    Paused,
    Completed,
    Failed,
    Stopped,
}

impl FrameworkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameworkState::Initialized => "initialized",
            FrameworkState::Configured => "configured",
            FrameworkState::Preparing => "preparing",
            FrameworkState::Running => "running",
            FrameworkState::Paused => "paused",
            FrameworkState::Completed => "completed",
            FrameworkState::Failed => "failed",
            FrameworkState::Stopped => "stopped",
        }
    }

    /// No further transitions happen without a reset.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FrameworkState::Completed | FrameworkState::Failed | FrameworkState::Stopped
        )
    }
}

impl fmt::Display for FrameworkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
