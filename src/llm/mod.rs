// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Chat-completion client used by the LLM cleaning stage.

pub mod client;
pub mod prompts;
pub mod usage;

pub use client::{format_response, Completion, HttpLlmClient, LlmClient};
pub use prompts::{cleaning_prompt, CLEANING_SYSTEM_PROMPT};
pub use usage::{CompletionUsage, TokenUsage, UsageSnapshot};
