// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use super::raw_corpus::{self, RawCorpusSummary};
use crate::config::consts::{DEFAULT_COMPONENT_VERSION, RAW_CONTENT_KEY};
use crate::config::{ConfigMap, Settings};
use crate::engine::{FrameworkContext, ManagedOperator};
use crate::errors::{ConfigError, CorpusError, Result};
use crate::llm::{HttpLlmClient, LlmClient, TokenUsage, UsageSnapshot};
use crate::operators::LlmCleaner;
use crate::storage::StorageStats;
use crate::text::load_tokenizer;
use crate::traits::{FrameworkBlueprint, FrameworkType, Lang, StageOperator};

/// Output key of one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageOutput {
    pub stage: String,
    pub output_key: String,
}

/// What a pretraining run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PretrainingReport {
    /// Stages in execution order
    pub pipeline_outputs: Vec<StageOutput>,
    /// Directory holding every snapshot
    pub output_path: PathBuf,
    pub final_output_key: String,
    pub final_output_file: Option<PathBuf>,
    /// Absent when token tracking is off
    pub token_usage: Option<UsageSnapshot>,
    pub storage_stats: StorageStats,
    pub raw_corpus: Option<RawCorpusSummary>,
}

/// Raw text or markdown corpus to chunked pretraining records.
///
/// Stages, each reading the key the previous one returned:
///
/// 1. `limitor`, only when `limit > 0`
/// 2. `llm_cleaner` on `raw_content`
/// 3. `cleaning_pipe`
/// 4. `text_splitter`
///
/// A directory input is first flattened into `preprocess_raw_corpus.jsonl`
/// in the output directory (see [`raw_corpus::preprocess`]) and the run reads
/// that file instead.
pub struct PretrainingFramework {
    llm_client: Option<Arc<dyn LlmClient>>,
    usage: Arc<TokenUsage>,
    raw_corpus: Option<RawCorpusSummary>,
}

impl Default for PretrainingFramework {
    fn default() -> Self {
        Self::new()
    }
}

impl PretrainingFramework {
    pub fn new() -> Self {
        Self {
            llm_client: None,
            usage: Arc::new(TokenUsage::new()),
            raw_corpus: None,
        }
    }

    /// Send cleaning requests through `client` instead of the HTTP endpoint
    /// in the settings.
    pub fn with_llm_client(client: Arc<dyn LlmClient>) -> Self {
        Self {
            llm_client: Some(client),
            ..Self::new()
        }
    }

    pub fn token_usage(&self) -> UsageSnapshot {
        self.usage.snapshot()
    }

    pub fn raw_corpus(&self) -> Option<&RawCorpusSummary> {
        self.raw_corpus.as_ref()
    }

    fn llm_cleaner_config(settings: &Settings) -> ConfigMap {
        let mut config = settings.section_map(&settings.llm_cleaner);
        if let Ok(retry) = serde_json::to_value(&settings.retry) {
            config.insert("retry".into(), retry);
        }
        if let Some(path) = &settings.text_splitter.tokenizer_path {
            config.insert(
                "tokenizer_path".into(),
                Value::from(path.to_string_lossy().into_owned()),
            );
        }
        config
    }
}

#[async_trait]
impl FrameworkBlueprint for PretrainingFramework {
    const FRAMEWORK_TYPE: FrameworkType = FrameworkType::Pretraining;
    const VERSION: &'static str = DEFAULT_COMPONENT_VERSION;
    const REQUIRED_OPERATORS: &'static [&'static str] = &["llm_cleaner", "text_splitter"];
    const REQUIRED_PIPELINES: &'static [&'static str] = &["cleaning_pipe"];

    type Report = PretrainingReport;

    fn name(&self) -> &str {
        "pretraining"
    }

    fn description(&self, lang: Lang) -> String {
        match lang {
            Lang::Zh => format!(
                "预训练数据生成框架\n功能：原始语料处理、LLM清洗、多阶段清理管道、智能文本分割\n版本：{}",
                Self::VERSION
            ),
            Lang::En => format!(
                "Pretraining data generation framework\nFeatures: raw corpus processing, LLM cleaning, \
                 multi-stage cleaning pipeline, token-aware text splitting\nVersion: {}",
                Self::VERSION
            ),
        }
    }

    fn on_init(&mut self, ctx: &mut FrameworkContext) -> Result<()> {
        if !ctx.input_file().is_dir() {
            return Ok(());
        }
        let settings = ctx.settings().clone();
        if !settings.processing.auto_detect_raw_corpus {
            return Err(ConfigError::invalid(
                "processing.auto_detect_raw_corpus",
                format!(
                    "input {} is a directory but raw corpus detection is off",
                    ctx.input_file().display()
                ),
            )
            .into());
        }

        let tokenizer = load_tokenizer(
            settings.text_splitter.tokenizer_path.as_deref(),
            settings.text_splitter.model_max_length,
        );
        let summary = raw_corpus::preprocess(
            ctx.input_file(),
            ctx.output_dir(),
            &settings.processing,
            tokenizer.as_ref(),
        )?;

        ctx.record_files(summary.files as u64);
        ctx.record_tokens(summary.tokens);
        for _ in &summary.skipped {
            ctx.record_error();
        }
        ctx.set_input_file(&summary.corpus_file);
        self.raw_corpus = Some(summary);
        Ok(())
    }

    fn prepare_components(&mut self, ctx: &mut FrameworkContext) -> Result<()> {
        let settings = ctx.settings().clone();

        if settings.limit > 0 {
            let mut config = ConfigMap::new();
            config.insert("limit".into(), Value::from(settings.limit));
            ctx.create_operator("limitor", &config)?;
        }

        let config = Self::llm_cleaner_config(&settings);
        let client = match &self.llm_client {
            Some(client) => Arc::clone(client),
            None => Arc::new(HttpLlmClient::new(&settings.llm_cleaner.llm)?) as Arc<dyn LlmClient>,
        };
        let cleaner = LlmCleaner::with_client(&config, client, Arc::clone(&self.usage))?;
        let mut cleaner: ManagedOperator<dyn StageOperator> =
            ManagedOperator::new(Box::new(cleaner), ctx.error_handler().clone());
        cleaner.configure(&config)?;
        ctx.add_operator(cleaner);

        ctx.create_pipeline("cleaning_pipe", settings.section_map(&settings.cleaning))?;
        ctx.create_operator("text_splitter", &settings.section_map(&settings.text_splitter))
    }

    async fn execute_pipeline(&mut self, ctx: &mut FrameworkContext) -> Result<PretrainingReport> {
        let mut outputs = Vec::new();
        let mut key = RAW_CONTENT_KEY.to_string();

        if ctx.has_operator("limitor") {
            key = ctx.run_operator("limitor", &key, None).await?;
            outputs.push(StageOutput {
                stage: "limitor".to_string(),
                output_key: key.clone(),
            });
        }

        key = ctx.run_operator("llm_cleaner", &key, None).await?;
        outputs.push(StageOutput {
            stage: "llm_cleaner".to_string(),
            output_key: key.clone(),
        });

        key = ctx.run_pipeline("cleaning_pipe", &key, None).await?;
        outputs.push(StageOutput {
            stage: "cleaning_pipe".to_string(),
            output_key: key.clone(),
        });

        key = ctx.run_operator("text_splitter", &key, None).await?;
        outputs.push(StageOutput {
            stage: "text_splitter".to_string(),
            output_key: key.clone(),
        });

        let storage = ctx.storage();
        let final_output_file = storage
            .get_file_info(Some(storage.operator_step() + 1))
            .map(|meta| meta.path.clone());
        if final_output_file.is_none() {
            return Err(CorpusError::Internal(
                "text_splitter finished without writing a snapshot".to_string(),
            ));
        }

        let token_usage = ctx
            .settings()
            .llm_cleaner
            .enable_token_tracking
            .then(|| self.usage.snapshot());
        Ok(PretrainingReport {
            pipeline_outputs: outputs,
            output_path: storage.cache_path().to_path_buf(),
            final_output_key: key,
            final_output_file,
            token_usage,
            storage_stats: storage.get_storage_stats(),
            raw_corpus: self.raw_corpus.clone(),
        })
    }
}
