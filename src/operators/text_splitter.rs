// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::{ConfigMap, TextSplitterSettings};
use crate::engine::ordered_map_blocking;
use crate::errors::{ConfigError, Result};
use crate::observability::messages::text::TextSplitCompleted;
use crate::storage::{text_value, FileStorage, Record, Table};
use crate::text::{load_tokenizer, AdaptiveChunker, Chunk, Tokenizer};
use crate::traits::{Describe, Lang, StageOperator};

/// Splits every record into token-bounded chunks, one output row per chunk.
///
/// A chunk row is a copy of its source row plus five columns named after the
/// output key `out`:
///
/// | column | value |
/// |---|---|
/// | `out_last_step_index` | row of the source snapshot |
/// | `out_last_step_chunk_index` | position among that row's chunks |
/// | `out` | chunk text |
/// | `out_tokens` | chunk tokens |
/// | `out_tokens_changed` | chunk tokens minus source tokens |
///
/// Records whose input is empty or not a string produce no rows.
pub struct TextSplitter {
    settings: TextSplitterSettings,
    max_workers: usize,
    limit: usize,
    chunker: Arc<AdaptiveChunker>,
}

impl TextSplitter {
    pub fn new(config: &ConfigMap) -> Result<Self> {
        let settings = TextSplitterSettings::default();
        let tokenizer = load_tokenizer(settings.tokenizer_path.as_deref(), settings.model_max_length);
        let mut splitter = Self {
            chunker: Arc::new(AdaptiveChunker::new(&settings, tokenizer)?),
            settings,
            max_workers: 1,
            limit: 0,
        };
        splitter.apply_config(config)?;
        Ok(splitter)
    }

    /// Splitter counting tokens with `tokenizer` instead of the configured one.
    pub fn with_tokenizer(settings: TextSplitterSettings, tokenizer: Arc<dyn Tokenizer>) -> Result<Self> {
        Ok(Self {
            chunker: Arc::new(AdaptiveChunker::new(&settings, tokenizer)?),
            settings,
            max_workers: 1,
            limit: 0,
        })
    }

    pub fn settings(&self) -> &TextSplitterSettings {
        &self.settings
    }
}

impl Describe for TextSplitter {
    fn name(&self) -> &str {
        "text_splitter"
    }

    fn description(&self, lang: Lang) -> String {
        match lang {
            Lang::Zh => format!(
                "轻量级文本分割工具，支持词/句/递归/Markdown 分块，当前方法：{}，块大小 {}，重叠 {}",
                self.settings.split_method, self.settings.chunk_size, self.settings.chunk_overlap
            ),
            Lang::En => format!(
                "Token-aware text splitter using {} chunks of {} tokens with {} overlap",
                self.settings.split_method, self.settings.chunk_size, self.settings.chunk_overlap
            ),
        }
    }
}

#[async_trait]
impl StageOperator for TextSplitter {
    fn apply_config(&mut self, config: &ConfigMap) -> Result<()> {
        let settings: TextSplitterSettings = serde_json::from_value(Value::Object(config.clone()))
            .map_err(|e| ConfigError::invalid("text_splitter", e.to_string()))?;
        let max_workers = config
            .get("max_workers")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(self.max_workers);
        let limit = config
            .get("limit")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(self.limit);

        if settings != self.settings {
            let tokenizer =
                load_tokenizer(settings.tokenizer_path.as_deref(), settings.model_max_length);
            self.chunker = Arc::new(AdaptiveChunker::new(&settings, tokenizer)?);
            self.settings = settings;
        }
        self.max_workers = max_workers.max(1);
        self.limit = limit;
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

        let records = table.len();
        let texts: Vec<Option<String>> = table
            .rows()
            .iter()
            .map(|row| text_value(row, input_key).map(str::to_string))
            .collect();
        let chunker = Arc::clone(&self.chunker);
        let chunked = ordered_map_blocking(texts, self.max_workers, move |row, text| match text {
            Some(text) => chunker.split_record(row, &text),
            None => Vec::new(),
        })
        .await?;

        let mut output = Table::new();
        for (row, chunks) in table.into_rows().into_iter().zip(chunked) {
            for chunk in chunks {
                output.push(chunk_row(&row, &output_key, chunk));
            }
        }

        tracing::info!(
            "{}",
            TextSplitCompleted {
                method: self.settings.split_method.as_str(),
                records,
                chunks: output.len(),
                output_key: &output_key,
            }
        );
        storage.write(&output)?;
        Ok(output_key)
    }
}

fn chunk_row(source: &Record, key: &str, chunk: Chunk) -> Record {
    let mut row = source.clone();
    row.insert(format!("{}_last_step_index", key), Value::from(chunk.source_row));
    row.insert(
        format!("{}_last_step_chunk_index", key),
        Value::from(chunk.chunk_index),
    );
    row.insert(key.to_string(), Value::from(chunk.text));
    row.insert(format!("{}_tokens", key), Value::from(chunk.tokens));
    row.insert(format!("{}_tokens_changed", key), Value::from(chunk.tokens_delta));
    row
}
