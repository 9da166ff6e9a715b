// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Token counts reported by the endpoint for one completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Point-in-time view of [`TokenUsage`]. Means are present once at least one
/// request was recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub total_requests: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_total_tokens: Option<u64>,
}

#[derive(Debug, Default)]
struct Counts {
    input_tokens: u64,
    output_tokens: u64,
    total_tokens: u64,
    total_requests: u64,
}

/// Running token totals, shared by every worker of a cleaning stage.
#[derive(Debug, Default)]
pub struct TokenUsage {
    counts: Mutex<Counts>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Counts> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count one successful request.
    pub fn record(&self, usage: &CompletionUsage) {
        let mut counts = self.lock();
        counts.input_tokens += usage.prompt_tokens;
        counts.output_tokens += usage.completion_tokens;
        counts.total_tokens += usage.total_tokens;
        counts.total_requests += 1;
    }

    pub fn reset(&self) {
        *self.lock() = Counts::default();
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        let counts = self.lock();
        let mean = |total: u64| {
            (counts.total_requests > 0).then(|| total / counts.total_requests)
        };
        UsageSnapshot {
            input_tokens: counts.input_tokens,
            output_tokens: counts.output_tokens,
            total_tokens: counts.total_tokens,
            total_requests: counts.total_requests,
            mean_input_tokens: mean(counts.input_tokens),
            mean_output_tokens: mean(counts.output_tokens),
            mean_total_tokens: mean(counts.total_tokens),
        }
    }
}
