// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::config::ConfigMap;
use crate::errors::{ConfigError, Result};
use crate::observability::messages::operator::RecordsLimited;
use crate::storage::FileStorage;
use crate::traits::{Describe, Lang, StageOperator};

/// Keeps the first `limit` records of the snapshot. `0` keeps everything.
///
/// The columns are untouched, so the stage returns its input key.
#[derive(Debug, Clone, Default)]
pub struct Limitor {
    limit: usize,
}

impl Limitor {
    pub fn new(config: &ConfigMap) -> Result<Self> {
        let mut limitor = Self::default();
        limitor.apply_config(config)?;
        Ok(limitor)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Describe for Limitor {
    fn name(&self) -> &str {
        "limitor"
    }

    fn description(&self, lang: Lang) -> String {
        match lang {
            Lang::Zh => "轻量级数据限制工具，按配置的数量截取记录，用于快速测试".to_string(),
            Lang::En => "Keeps the first N records of a snapshot, for quick test runs".to_string(),
        }
    }
}

#[async_trait]
impl StageOperator for Limitor {
    fn apply_config(&mut self, config: &ConfigMap) -> Result<()> {
        if let Some(value) = config.get("limit") {
            self.limit = value
                .as_u64()
                .ok_or_else(|| ConfigError::invalid("limit", "must be a non-negative integer"))?
                as usize;
        }
        Ok(())
    }

    async fn run(
        &self,
        storage: &mut FileStorage,
        input_key: &str,
        _output_key: Option<&str>,
    ) -> Result<String> {
        let mut table = storage.read()?;
        let before = table.len();
        table.truncate(self.limit);
        tracing::info!(
            "{}",
            RecordsLimited {
                before,
                after: table.len(),
                limit: self.limit,
            }
        );
        storage.write(&table)?;
        Ok(input_key.to_string())
    }
}
