// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use super::hooks::{Hook, Hooks, LifecycleEvent};
use super::state::OperatorState;
use crate::config::ConfigMap;
use crate::errors::{CorpusError, ErrorContext, ErrorHandler, Result};
use crate::observability::messages::operator::{
    OperatorConfigured, OperatorControlRequested, OperatorExecutionCompleted,
    OperatorExecutionFailed, OperatorExecutionStarted,
};
use crate::observability::messages::StructuredLog;
use crate::storage::FileStorage;
use crate::traits::{Describe, Lang, StageOperator, TextOperator};

/// Execution counters of one operator. Times are in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OperatorMetrics {
    pub execution_count: u64,
    pub error_count: u64,
    pub total_time: f64,
    pub average_execution_time: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperatorInfo {
    pub name: String,
    pub description: String,
    pub state: OperatorState,
    pub created_at: DateTime<Utc>,
    pub config: ConfigMap,
    pub metrics: OperatorMetrics,
}

#[derive(Debug)]
struct LifecycleState {
    state: OperatorState,
    config: ConfigMap,
    metrics: OperatorMetrics,
}

/// Lifecycle, hooks and metrics around an operator's business logic.
///
/// `execute` moves the operator to `Running`, fires `BeforeRun`, calls the
/// inner `run`, then either records success (`Completed`, `AfterRun`,
/// `OnComplete`) or failure (`Failed`, `OnError`, report to the error
/// handler) and returns the result unchanged. Every call counts toward
/// `execution_count`; failures also count toward `error_count`.
///
/// A stopped operator refuses to execute until `reset()`.
pub struct ManagedOperator<T: ?Sized> {
    name: String,
    created_at: DateTime<Utc>,
    inner: Box<T>,
    lifecycle: Mutex<LifecycleState>,
    hooks: Hooks<LifecycleEvent>,
    error_handler: ErrorHandler,
}

impl<T: ?Sized + Describe> ManagedOperator<T> {
    pub fn new(inner: Box<T>, error_handler: ErrorHandler) -> Self {
        let name = inner.name().to_string();
        Self {
            hooks: Hooks::new(&name),
            name,
            created_at: Utc::now(),
            inner,
            lifecycle: Mutex::new(LifecycleState {
                state: OperatorState::Initialized,
                config: ConfigMap::new(),
                metrics: OperatorMetrics::default(),
            }),
            error_handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn lock(&self) -> MutexGuard<'_, LifecycleState> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> OperatorState {
        self.lock().state
    }

    pub fn config(&self) -> ConfigMap {
        self.lock().config.clone()
    }

    pub fn get_desc(&self, lang: Lang) -> String {
        self.inner.description(lang)
    }

    pub fn add_hook(&self, event: LifecycleEvent, hook: Hook) {
        self.hooks.add(event, hook);
    }

    /// Request a stop. A running execution finishes; later ones are refused.
    pub fn stop(&self) {
        self.lock().state = OperatorState::Stopped;
        tracing::info!(
            "{}",
            OperatorControlRequested {
                operator: &self.name,
                action: "stop",
            }
        );
    }

    /// Back to `Initialized` with zeroed metrics. Config is kept.
    pub fn reset(&self) {
        {
            let mut lifecycle = self.lock();
            lifecycle.state = OperatorState::Initialized;
            lifecycle.metrics = OperatorMetrics::default();
        }
        tracing::info!(
            "{}",
            OperatorControlRequested {
                operator: &self.name,
                action: "reset",
            }
        );
    }

    pub fn get_metrics(&self) -> OperatorMetrics {
        let mut metrics = self.lock().metrics.clone();
        if metrics.execution_count > 0 {
            metrics.average_execution_time = metrics.total_time / metrics.execution_count as f64;
        }
        metrics
    }

    pub fn get_info(&self) -> OperatorInfo {
        let (state, config) = {
            let lifecycle = self.lock();
            (lifecycle.state, lifecycle.config.clone())
        };
        OperatorInfo {
            name: self.name.clone(),
            description: self.get_desc(Lang::En),
            state,
            created_at: self.created_at,
            config,
            metrics: self.get_metrics(),
        }
    }

    fn merge_config(&self, config: &ConfigMap) -> ConfigMap {
        let merged = {
            let mut lifecycle = self.lock();
            for (key, value) in config {
                lifecycle.config.insert(key.clone(), value.clone());
            }
            lifecycle.state = OperatorState::Configured;
            lifecycle.config.clone()
        };
        tracing::debug!(
            "{}",
            OperatorConfigured {
                operator: &self.name,
                keys: merged.len(),
            }
        );
        merged
    }

    fn begin(&self) -> Result<Instant> {
        let execution = {
            let mut lifecycle = self.lock();
            if lifecycle.state == OperatorState::Stopped {
                return Err(CorpusError::InvalidState {
                    component: self.name.clone(),
                    action: "execute",
                    state: OperatorState::Stopped.to_string(),
                });
            }
            lifecycle.state = OperatorState::Running;
            lifecycle.metrics.execution_count += 1;
            lifecycle.metrics.execution_count
        };
        OperatorExecutionStarted {
            operator: &self.name,
            execution,
        }
        .log();
        self.hooks.fire(LifecycleEvent::BeforeRun, None);
        Ok(Instant::now())
    }

    fn finish<R>(&self, started: Instant, result: Result<R>) -> Result<R> {
        let elapsed = started.elapsed();
        match result {
            Ok(value) => {
                {
                    let mut lifecycle = self.lock();
                    lifecycle.metrics.total_time += elapsed.as_secs_f64();
                    if lifecycle.state != OperatorState::Stopped {
                        lifecycle.state = OperatorState::Completed;
                    }
                }
                tracing::debug!(
                    "{}",
                    OperatorExecutionCompleted {
                        operator: &self.name,
                        elapsed,
                    }
                );
                self.hooks.fire(LifecycleEvent::AfterRun, None);
                self.hooks.fire(LifecycleEvent::OnComplete, None);
                Ok(value)
            }
            Err(error) => {
                {
                    let mut lifecycle = self.lock();
                    lifecycle.metrics.total_time += elapsed.as_secs_f64();
                    lifecycle.metrics.error_count += 1;
                    lifecycle.state = OperatorState::Failed;
                }
                tracing::debug!(
                    "{}",
                    OperatorExecutionFailed {
                        operator: &self.name,
                        error: &error,
                    }
                );
                self.hooks.fire(LifecycleEvent::OnError, Some(&error));
                self.error_handler.handle(
                    &error,
                    ErrorContext::new("operator_execute").with("operator", &self.name),
                );
                Err(error)
            }
        }
    }
}

impl ManagedOperator<dyn TextOperator> {
    /// Merge `config` into the operator's recorded configuration.
    pub fn configure(&self, config: &ConfigMap) {
        self.merge_config(config);
    }

    pub fn execute(&self, input: &str) -> Result<String> {
        let started = self.begin()?;
        let result = self.inner.run(input);
        self.finish(started, result)
    }
}

impl ManagedOperator<dyn StageOperator> {
    /// Merge `config` and hand the merged map to the operator.
    pub fn configure(&mut self, config: &ConfigMap) -> Result<()> {
        let merged = self.merge_config(config);
        self.inner.apply_config(&merged)
    }

    /// Run one stage against `storage`, returning the key the stage wrote.
    pub async fn execute(
        &self,
        storage: &mut FileStorage,
        input_key: &str,
        output_key: Option<&str>,
    ) -> Result<String> {
        let started = self.begin()?;
        let result = self.inner.run(storage, input_key, output_key).await;
        self.finish(started, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageSettings;
    use crate::storage::Table;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Fails the first `failures` calls, then upper-cases.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    impl Describe for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn description(&self, lang: Lang) -> String {
            match lang {
                Lang::Zh => "不稳定的算子".to_string(),
                Lang::En => "Fails a fixed number of times".to_string(),
            }
        }
    }

    impl TextOperator for Flaky {
        fn run(&self, input: &str) -> Result<String> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(CorpusError::Data("not yet".into()));
            }
            Ok(input.to_uppercase())
        }
    }

    fn flaky(failures: usize) -> ManagedOperator<dyn TextOperator> {
        ManagedOperator::new(
            Box::new(Flaky {
                failures,
                calls: AtomicUsize::new(0),
            }),
            ErrorHandler::default(),
        )
    }

    #[test]
    fn test_counts_failures_separately() {
        let op = flaky(3);
        for _ in 0..3 {
            assert!(op.execute("abc").is_err());
            assert_eq!(op.state(), OperatorState::Failed);
        }
        assert_eq!(op.execute("abc").unwrap(), "ABC");
        assert_eq!(op.state(), OperatorState::Completed);

        let metrics = op.get_metrics();
        assert_eq!(metrics.execution_count, 4);
        assert_eq!(metrics.error_count, 3);
        assert!(metrics.average_execution_time <= metrics.total_time);
        assert_eq!(op.error_handler.reporter().len(), 3);
    }

    #[test]
    fn test_configure_and_reset() {
        let op = flaky(0);
        let mut config = ConfigMap::new();
        config.insert("replacement_text".into(), json!(" "));
        op.configure(&config);
        assert_eq!(op.state(), OperatorState::Configured);

        let mut more = ConfigMap::new();
        more.insert("extra".into(), json!(1));
        op.configure(&more);
        assert_eq!(op.config().len(), 2);

        op.execute("x").unwrap();
        op.reset();
        assert_eq!(op.state(), OperatorState::Initialized);
        assert_eq!(op.get_metrics(), OperatorMetrics::default());
        assert_eq!(op.config().len(), 2);
    }

    #[test]
    fn test_stopped_operator_refuses_until_reset() {
        let op = flaky(0);
        op.stop();
        assert!(matches!(
            op.execute("x"),
            Err(CorpusError::InvalidState { .. })
        ));
        assert_eq!(op.get_metrics().execution_count, 0);

        op.reset();
        assert_eq!(op.execute("x").unwrap(), "X");
    }

    #[test]
    fn test_hooks_fire_and_failures_do_not_propagate() {
        let op = flaky(1);
        let errors = Arc::new(AtomicUsize::new(0));
        let completions = Arc::new(AtomicUsize::new(0));

        let counter = errors.clone();
        op.add_hook(
            LifecycleEvent::OnError,
            Arc::new(move |ctx| {
                assert!(ctx.error.is_some());
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        let counter = completions.clone();
        op.add_hook(
            LifecycleEvent::OnComplete,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        op.add_hook(
            LifecycleEvent::BeforeRun,
            Arc::new(|_| Err("hook is broken".into())),
        );

        assert!(op.execute("a").is_err());
        assert_eq!(op.execute("a").unwrap(), "A");
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_info_and_description() {
        let op = flaky(0);
        assert_eq!(op.get_desc(Lang::En), "Fails a fixed number of times");
        let info = op.get_info();
        assert_eq!(info.name, "flaky");
        assert_eq!(info.state, OperatorState::Initialized);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["state"], "initialized");
    }

    /// Copies the input column to the output column.
    struct CopyColumn {
        suffix: String,
    }

    impl Describe for CopyColumn {
        fn name(&self) -> &str {
            "copy_column"
        }

        fn description(&self, _lang: Lang) -> String {
            "Copies a column".to_string()
        }
    }

    #[async_trait]
    impl StageOperator for CopyColumn {
        fn apply_config(&mut self, config: &ConfigMap) -> Result<()> {
            if let Some(suffix) = config.get("suffix").and_then(|v| v.as_str()) {
                self.suffix = suffix.to_string();
            }
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
            table.ensure_present(input_key)?;
            table.ensure_absent(&output_key)?;
            let values = table
                .column(input_key)
                .into_iter()
                .map(|v| json!(format!("{}{}", v.as_str().unwrap_or_default(), self.suffix)))
                .collect();
            table.set_column(&output_key, values)?;
            storage.write(&table)?;
            Ok(output_key)
        }
    }

    #[tokio::test]
    async fn test_stage_operator_configure_and_execute() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("input.jsonl");
        std::fs::write(&input, "{\"text\":\"a\"}\n{\"text\":\"b\"}\n").unwrap();
        let mut storage = FileStorage::new(
            &input,
            dir.path().join("cache"),
            &StorageSettings::default(),
            ErrorHandler::default(),
        )
        .unwrap();

        let mut op: ManagedOperator<dyn StageOperator> = ManagedOperator::new(
            Box::new(CopyColumn {
                suffix: String::new(),
            }),
            ErrorHandler::default(),
        );
        let mut config = ConfigMap::new();
        config.insert("suffix".into(), json!("!"));
        op.configure(&config).unwrap();

        let key = op.execute(storage.step(), "text", None).await.unwrap();
        assert_eq!(key, "step1_content");
        assert_eq!(op.state(), OperatorState::Completed);

        let table: Table = storage.step().read().unwrap();
        assert_eq!(table.column("step1_content"), vec![json!("a!"), json!("b!")]);

        // Same output key again collides
        let err = op.execute(&mut storage, "text", Some("text")).await.unwrap_err();
        assert_eq!(err.kind_name(), "KeyCollision");
        assert_eq!(op.get_metrics().error_count, 1);
    }
}
