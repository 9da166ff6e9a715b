// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::time::Duration;

use crate::config::{ConfigMap, Registration, Registry, RegistryKind};
use crate::errors::Result;
use crate::operators::{microops, Limitor, LlmCleaner, TextSplitter};
use crate::pipelines::CleaningPipeline;
use crate::traits::{PipelineBlueprint, StageOperator, TextOperator};

/// The three registries a run builds its components from.
///
/// Built once at startup and shared behind an `Arc` by every framework of
/// the process.
pub struct Registries {
    /// Per-record text operators, looked up by pipelines
    pub micro_ops: Registry<Box<dyn TextOperator>>,
    /// Whole-stage operators
    pub operators: Registry<Box<dyn StageOperator>>,
    pub pipelines: Registry<Box<dyn PipelineBlueprint>>,
}

impl Registries {
    /// Empty registries whose caches keep entries for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            micro_ops: Registry::with_ttl("micro_ops", RegistryKind::Operator, ttl),
            operators: Registry::with_ttl("operators", RegistryKind::Operator, ttl),
            pipelines: Registry::with_ttl("pipelines", RegistryKind::Pipeline, ttl),
        }
    }

    /// Registries holding every built-in component. Micro-operations resolve
    /// lazily through their namespace on first use.
    pub fn with_builtins(ttl: Duration) -> Result<Self> {
        let registries = Self::new(ttl);
        registries
            .micro_ops
            .add_fallback_namespace(microops::NAMESPACE, microops::resolve);

        let source = |module: &str| {
            Some(Registration {
                source_module: Some(module.to_string()),
                version: None,
            })
        };

        registries.operators.register(
            "limitor",
            Arc::new(|config: &ConfigMap| {
                Ok(Box::new(Limitor::new(config)?) as Box<dyn StageOperator>)
            }),
            source(module_path!()),
        )?;
        registries.operators.register(
            "llm_cleaner",
            Arc::new(|config: &ConfigMap| {
                Ok(Box::new(LlmCleaner::new(config)?) as Box<dyn StageOperator>)
            }),
            source(module_path!()),
        )?;
        registries.operators.register(
            "text_splitter",
            Arc::new(|config: &ConfigMap| {
                Ok(Box::new(TextSplitter::new(config)?) as Box<dyn StageOperator>)
            }),
            source(module_path!()),
        )?;
        registries.pipelines.register(
            "cleaning_pipe",
            Arc::new(|_: &ConfigMap| {
                Ok(Box::new(CleaningPipeline::new()) as Box<dyn PipelineBlueprint>)
            }),
            source(module_path!()),
        )?;
        Ok(registries)
    }
}
