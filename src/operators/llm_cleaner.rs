// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::consts::DEFAULT_MODEL_MAX_LENGTH;
use crate::config::{ConfigMap, LlmCleanerSettings, RetrySettings};
use crate::engine::ordered_map;
use crate::errors::{ConfigError, Result, RetryPolicy};
use crate::llm::{cleaning_prompt, HttpLlmClient, LlmClient, TokenUsage, CLEANING_SYSTEM_PROMPT};
use crate::observability::messages::llm::{
    LlmCleaningCompleted, LlmCleaningStarted, LlmRequestFailed,
};
use crate::storage::{text_value, FileStorage};
use crate::text::{count_tokens, load_tokenizer, Tokenizer};
use crate::traits::{Describe, Lang, StageOperator};

enum RowOutcome {
    Skipped,
    Cleaned(String),
    Failed,
}

/// Rewrites every record through a chat model with the OCR-cleaning prompt.
///
/// Requests run on a pool of `max_workers` concurrent calls. A request that
/// still fails after the retry policy leaves `null` in the output column and
/// the stage carries on. Empty and non-string inputs are not sent and also
/// come out as `null`.
///
/// Writes `out`, `out_tokens` and `out_tokens_changed`. The change is taken
/// against `{input_key}_tokens` when that column exists, otherwise it is 0.
pub struct LlmCleaner {
    settings: LlmCleanerSettings,
    max_workers: usize,
    limit: usize,
    retry: RetryPolicy,
    tokenizer_path: Option<PathBuf>,
    tokenizer: Arc<dyn Tokenizer>,
    client: Arc<dyn LlmClient>,
    injected_client: bool,
    usage: Arc<TokenUsage>,
}

impl LlmCleaner {
    /// Cleaner talking HTTP to the endpoint in `config`'s `llm` section.
    pub fn new(config: &ConfigMap) -> Result<Self> {
        let settings = LlmCleanerSettings::default();
        let client = Arc::new(HttpLlmClient::new(&settings.llm)?);
        let mut cleaner = Self::build(settings, client, false, Arc::new(TokenUsage::new()));
        cleaner.apply_config(config)?;
        Ok(cleaner)
    }

    /// Cleaner sending requests through `client` and counting tokens into
    /// `usage`. Reconfiguring never replaces the client.
    pub fn with_client(
        config: &ConfigMap,
        client: Arc<dyn LlmClient>,
        usage: Arc<TokenUsage>,
    ) -> Result<Self> {
        let mut cleaner = Self::build(LlmCleanerSettings::default(), client, true, usage);
        cleaner.apply_config(config)?;
        Ok(cleaner)
    }

    fn build(
        settings: LlmCleanerSettings,
        client: Arc<dyn LlmClient>,
        injected_client: bool,
        usage: Arc<TokenUsage>,
    ) -> Self {
        Self {
            settings,
            max_workers: 1,
            limit: 0,
            retry: RetryPolicy::default(),
            tokenizer_path: None,
            tokenizer: load_tokenizer(None, DEFAULT_MODEL_MAX_LENGTH),
            client,
            injected_client,
            usage,
        }
    }

    pub fn usage(&self) -> &Arc<TokenUsage> {
        &self.usage
    }

    pub fn settings(&self) -> &LlmCleanerSettings {
        &self.settings
    }
}

impl Describe for LlmCleaner {
    fn name(&self) -> &str {
        "llm_cleaner"
    }

    fn description(&self, lang: Lang) -> String {
        match lang {
            Lang::Zh => "基于大模型对文本进行清洗。".to_string(),
            Lang::En => "Using LLM for text cleaning.".to_string(),
        }
    }
}

#[async_trait]
impl StageOperator for LlmCleaner {
    fn apply_config(&mut self, config: &ConfigMap) -> Result<()> {
        let settings: LlmCleanerSettings = serde_json::from_value(Value::Object(config.clone()))
            .map_err(|e| ConfigError::invalid("llm_cleaner", e.to_string()))?;
        if let Some(retry) = config.get("retry") {
            let retry: RetrySettings = serde_json::from_value(retry.clone())
                .map_err(|e| ConfigError::invalid("llm_cleaner.retry", e.to_string()))?;
            self.retry = retry.to_policy();
        }
        if let Some(n) = config.get("max_workers").and_then(Value::as_u64) {
            self.max_workers = (n as usize).max(1);
        }
        if let Some(n) = config.get("limit").and_then(Value::as_u64) {
            self.limit = n as usize;
        }

        let tokenizer_path = config
            .get("tokenizer_path")
            .and_then(Value::as_str)
            .map(PathBuf::from);
        if tokenizer_path != self.tokenizer_path {
            self.tokenizer = load_tokenizer(tokenizer_path.as_deref(), DEFAULT_MODEL_MAX_LENGTH);
            self.tokenizer_path = tokenizer_path;
        }

        if !self.injected_client && settings.llm != self.settings.llm {
            self.client = Arc::new(HttpLlmClient::new(&settings.llm)?);
        }
        self.settings = settings;
        Ok(())
    }

    async fn run(
        &self,
        storage: &mut FileStorage,
        input_key: &str,
        output_key: Option<&str>,
    ) -> Result<String> {
        let output_key = output_key
            .map(str::to_string)
            .unwrap_or_else(|| storage.default_output_key());

        let mut table = storage.read()?;
        table.truncate(self.limit);
        table.ensure_present(input_key)?;
        table.ensure_absent(&output_key)?;

        if self.settings.reset_tokens_on_start {
            self.usage.reset();
        }

        let texts: Vec<Option<String>> = table
            .rows()
            .iter()
            .map(|row| {
                text_value(row, input_key)
                    .filter(|text| !text.is_empty())
                    .map(str::to_string)
            })
            .collect();
        let skipped_empty = texts.iter().filter(|t| t.is_none()).count();
        tracing::info!(
            "{}",
            LlmCleaningStarted {
                model: self.client.model(),
                records: texts.len(),
                skipped_empty,
                max_workers: self.max_workers,
            }
        );

        let client = Arc::clone(&self.client);
        let usage = Arc::clone(&self.usage);
        let retry = self.retry.clone();
        let track_tokens = self.settings.enable_token_tracking;
        let outcomes = ordered_map(texts, self.max_workers, move |row, text| {
            let client = Arc::clone(&client);
            let usage = Arc::clone(&usage);
            let retry = retry.clone();
            async move {
                let Some(text) = text else {
                    return RowOutcome::Skipped;
                };
                let prompt = cleaning_prompt(&text);
                let result = retry
                    .retry("llm_request", || client.complete(CLEANING_SYSTEM_PROMPT, &prompt))
                    .await;
                match result {
                    Ok(completion) => {
                        if let (true, Some(counts)) = (track_tokens, completion.usage.as_ref()) {
                            usage.record(counts);
                        }
                        RowOutcome::Cleaned(completion.text)
                    }
                    Err(error) => {
                        tracing::warn!(
                            "{}",
                            LlmRequestFailed {
                                model: client.model(),
                                row,
                                error: &error,
                            }
                        );
                        RowOutcome::Failed
                    }
                }
            }
        })
        .await?;

        let input_tokens_key = format!("{}_tokens", input_key);
        let has_input_tokens = table.contains_column(&input_tokens_key);
        let mut cleaned = 0;
        let mut failed = 0;
        let mut texts_out = Vec::with_capacity(outcomes.len());
        let mut tokens_out = Vec::with_capacity(outcomes.len());
        let mut changed_out = Vec::with_capacity(outcomes.len());
        for (row, outcome) in table.rows().iter().zip(outcomes) {
            let text = match outcome {
                RowOutcome::Cleaned(text) => {
                    cleaned += 1;
                    Some(text)
                }
                RowOutcome::Failed => {
                    failed += 1;
                    None
                }
                RowOutcome::Skipped => None,
            };
            let tokens = text
                .as_deref()
                .map(|t| count_tokens(self.tokenizer.as_ref(), t))
                .unwrap_or(0) as i64;
            let changed = if has_input_tokens {
                row.get(&input_tokens_key)
                    .and_then(Value::as_i64)
                    .map(|before| tokens - before)
                    .unwrap_or(0)
            } else {
                0
            };
            texts_out.push(text.map(Value::from).unwrap_or(Value::Null));
            tokens_out.push(Value::from(tokens));
            changed_out.push(Value::from(changed));
        }

        table.set_column(&output_key, texts_out)?;
        table.set_column(&format!("{}_tokens", output_key), tokens_out)?;
        table.set_column(&format!("{}_tokens_changed", output_key), changed_out)?;

        let totals = self.usage.snapshot();
        tracing::info!(
            "{}",
            LlmCleaningCompleted {
                cleaned,
                failed,
                requests: totals.total_requests,
                input_tokens: totals.input_tokens,
                output_tokens: totals.output_tokens,
            }
        );
        storage.write(&table)?;
        Ok(output_key)
    }
}
