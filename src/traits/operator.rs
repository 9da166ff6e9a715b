// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ConfigMap;
use crate::errors::Result;
use crate::storage::FileStorage;

/// Language of a human-readable description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    Zh,
    En,
}

/// Name and description shared by every operator kind.
pub trait Describe: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self, lang: Lang) -> String;
}

/// Business logic of a per-record text transformation.
///
/// Implementations are pure: no state transitions, no metrics. Those belong
/// to [`crate::engine::ManagedOperator`].
pub trait TextOperator: Describe {
    fn run(&self, input: &str) -> Result<String>;
}

/// Business logic of a whole stage: read the current snapshot, transform
/// the `input_key` column, write the next snapshot, and return the key the
/// next stage should read.
#[async_trait]
pub trait StageOperator: Describe {
    /// Apply settings merged by `configure`. Operators without tunables keep
    /// the default.
    fn apply_config(&mut self, _config: &ConfigMap) -> Result<()> {
        Ok(())
    }

    async fn run(
        &self,
        storage: &mut FileStorage,
        input_key: &str,
        output_key: Option<&str>,
    ) -> Result<String>;
}
