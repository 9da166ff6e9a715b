// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::Instrument;

use super::hooks::{Hook, Hooks, LifecycleEvent};
use super::operator::{ManagedOperator, OperatorInfo};
use super::pool::ordered_map_blocking;
use super::state::PipelineState;
use crate::config::{ConfigMap, Registry};
use crate::errors::{ConfigError, CorpusError, ErrorContext, ErrorHandler, Result};
use crate::observability::messages::pipeline::{
    OperatorSkipped, PipelineCompleted, PipelineStarted, RecordReverted,
};
use crate::observability::messages::StructuredLog;
use crate::storage::FileStorage;
use crate::traits::{Lang, PipelineBlueprint, TextOperator};

/// What happens to a record when one operator in the chain fails on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFailurePolicy {
    /// Discard every step of the chain and keep the original text.
    #[default]
    RevertRecord,
    /// Keep the text from before the failing operator and carry on.
    SkipOperator,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineMetrics {
    pub runs: u64,
    pub records_processed: u64,
    pub records_failed: u64,
    /// Seconds spent in `run`.
    pub total_time: f64,
    pub errors: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineInfo {
    pub name: String,
    pub description: String,
    pub state: PipelineState,
    pub created_at: DateTime<Utc>,
    pub max_workers: usize,
    pub limit: usize,
    pub failure_policy: RecordFailurePolicy,
    pub operators: Vec<OperatorInfo>,
    pub metrics: PipelineMetrics,
}

/// The fixed operator list, shared with the worker tasks.
struct RecordChain {
    pipeline: String,
    operators: Vec<ManagedOperator<dyn TextOperator>>,
    policy: RecordFailurePolicy,
}

impl RecordChain {
    /// Run every operator over one value. Returns the new value and whether
    /// any operator failed. Nulls, empty strings and non-strings pass through.
    fn process(&self, row: usize, value: Value) -> (Value, bool) {
        let original = match value {
            Value::String(text) if !text.is_empty() => text,
            other => return (other, false),
        };

        let mut text = original.clone();
        let mut failed = false;
        for operator in &self.operators {
            match operator.execute(&text) {
                Ok(next) => text = next,
                Err(error) => {
                    failed = true;
                    match self.policy {
                        RecordFailurePolicy::RevertRecord => {
                            tracing::warn!(
                                "{}",
                                RecordReverted {
                                    pipeline: &self.pipeline,
                                    row,
                                    operator: operator.name(),
                                    error: &error,
                                }
                            );
                            return (Value::String(original), true);
                        }
                        RecordFailurePolicy::SkipOperator => {
                            tracing::warn!(
                                "{}",
                                OperatorSkipped {
                                    pipeline: &self.pipeline,
                                    row,
                                    operator: operator.name(),
                                    error: &error,
                                }
                            );
                        }
                    }
                }
            }
        }
        (Value::String(text), failed)
    }
}

#[derive(Debug)]
struct PipelineRuntime {
    state: PipelineState,
    metrics: PipelineMetrics,
}

/// An ordered chain of text operators applied to every record of a
/// snapshot column.
///
/// The chain is built once by the blueprint when the pipeline is
/// constructed. Records are processed in parallel on at most `max_workers`
/// blocking workers; each record runs the whole chain in order, and output
/// rows keep input order. A failing operator never aborts the batch: the
/// record is handled by the [`RecordFailurePolicy`] and counted.
pub struct Pipeline {
    name: String,
    created_at: DateTime<Utc>,
    blueprint: Box<dyn PipelineBlueprint>,
    max_workers: usize,
    limit: usize,
    config: ConfigMap,
    chain: Arc<RecordChain>,
    runtime: Mutex<PipelineRuntime>,
    hooks: Hooks<LifecycleEvent>,
    error_handler: ErrorHandler,
}

impl Pipeline {
    pub fn new(
        blueprint: Box<dyn PipelineBlueprint>,
        max_workers: usize,
        limit: usize,
        config: ConfigMap,
        micro_ops: &Registry<Box<dyn TextOperator>>,
        error_handler: ErrorHandler,
    ) -> Result<Self> {
        let policy = match config.get("record_failure_policy") {
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                ConfigError::invalid("record_failure_policy", e.to_string())
            })?,
            None => RecordFailurePolicy::default(),
        };

        let operators = blueprint
            .configure_operators(&config, micro_ops)?
            .into_iter()
            .map(|op| ManagedOperator::new(op, error_handler.clone()))
            .collect();

        let name = blueprint.name().to_string();
        Ok(Self {
            hooks: Hooks::new(&name),
            chain: Arc::new(RecordChain {
                pipeline: name.clone(),
                operators,
                policy,
            }),
            name,
            created_at: Utc::now(),
            blueprint,
            max_workers: max_workers.max(1),
            limit,
            config,
            runtime: Mutex::new(PipelineRuntime {
                state: PipelineState::Configured,
                metrics: PipelineMetrics::default(),
            }),
            error_handler,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ConfigMap {
        &self.config
    }

    pub fn failure_policy(&self) -> RecordFailurePolicy {
        self.chain.policy
    }

    /// Names of the chained operators, in application order.
    pub fn operator_names(&self) -> Vec<&str> {
        self.chain.operators.iter().map(|op| op.name()).collect()
    }

    fn lock(&self) -> MutexGuard<'_, PipelineRuntime> {
        self.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> PipelineState {
        self.lock().state
    }

    pub fn get_desc(&self, lang: Lang) -> String {
        self.blueprint.description(lang)
    }

    pub fn add_hook(&self, event: LifecycleEvent, hook: Hook) {
        self.hooks.add(event, hook);
    }

    pub fn stop(&self) {
        self.lock().state = PipelineState::Stopped;
    }

    /// Back to `Initialized` with zeroed metrics, including every chained
    /// operator's.
    pub fn reset(&self) {
        {
            let mut runtime = self.lock();
            runtime.state = PipelineState::Initialized;
            runtime.metrics = PipelineMetrics::default();
        }
        for operator in &self.chain.operators {
            operator.reset();
        }
    }

    pub fn get_metrics(&self) -> PipelineMetrics {
        self.lock().metrics.clone()
    }

    pub fn get_info(&self) -> PipelineInfo {
        let (state, metrics) = {
            let runtime = self.lock();
            (runtime.state, runtime.metrics.clone())
        };
        PipelineInfo {
            name: self.name.clone(),
            description: self.get_desc(Lang::En),
            state,
            created_at: self.created_at,
            max_workers: self.max_workers,
            limit: self.limit,
            failure_policy: self.chain.policy,
            operators: self.chain.operators.iter().map(|op| op.get_info()).collect(),
            metrics,
        }
    }

    /// Apply the chain to `input_key` of the current snapshot and write the
    /// result under `output_key` (default `step{n}_content`) as the next
    /// snapshot. Returns the output key.
    pub async fn run(
        &self,
        storage: &mut FileStorage,
        input_key: &str,
        output_key: Option<&str>,
    ) -> Result<String> {
        {
            let mut runtime = self.lock();
            if runtime.state == PipelineState::Stopped {
                return Err(CorpusError::InvalidState {
                    component: self.name.clone(),
                    action: "run",
                    state: PipelineState::Stopped.to_string(),
                });
            }
            runtime.state = PipelineState::Running;
            runtime.metrics.runs += 1;
        }
        self.hooks.fire(LifecycleEvent::BeforeRun, None);

        let started = Instant::now();
        let result = self.run_stage(storage, input_key, output_key).await;
        let elapsed = started.elapsed();

        match result {
            Ok((output_key, records, failed_records)) => {
                {
                    let mut runtime = self.lock();
                    runtime.metrics.total_time += elapsed.as_secs_f64();
                    runtime.metrics.records_processed += records as u64;
                    runtime.metrics.records_failed += failed_records as u64;
                    if runtime.state != PipelineState::Stopped {
                        runtime.state = PipelineState::Completed;
                    }
                }
                let msg = PipelineCompleted {
                    pipeline: &self.name,
                    records,
                    failed_records,
                    elapsed,
                };
                if failed_records > 0 {
                    tracing::warn!("{}", msg);
                } else {
                    tracing::info!("{}", msg);
                }
                self.hooks.fire(LifecycleEvent::AfterRun, None);
                self.hooks.fire(LifecycleEvent::OnComplete, None);
                Ok(output_key)
            }
            Err(error) => {
                {
                    let mut runtime = self.lock();
                    runtime.metrics.total_time += elapsed.as_secs_f64();
                    runtime.metrics.errors += 1;
                    runtime.state = PipelineState::Failed;
                }
                self.hooks.fire(LifecycleEvent::OnError, Some(&error));
                self.error_handler.propagate(
                    Err(error),
                    ErrorContext::new("pipeline_run")
                        .with("pipeline", &self.name)
                        .with("input_key", input_key),
                )
            }
        }
    }

    async fn run_stage(
        &self,
        storage: &mut FileStorage,
        input_key: &str,
        output_key: Option<&str>,
    ) -> Result<(String, usize, usize)> {
        let output_key = output_key
            .map(str::to_string)
            .unwrap_or_else(|| storage.default_output_key());

        let mut table = storage.read()?;
        table.truncate(self.limit);
        table.ensure_present(input_key)?;
        if output_key != input_key {
            table.ensure_absent(&output_key)?;
        }

        let started = PipelineStarted {
            pipeline: &self.name,
            input_key,
            output_key: &output_key,
            records: table.len(),
            operators: self.chain.operators.len(),
            max_workers: self.max_workers,
        };
        started.log();
        let span = started.span("pipeline_run");

        let chain = self.chain.clone();
        let outcomes = ordered_map_blocking(
            table.column(input_key),
            self.max_workers,
            move |row, value| chain.process(row, value),
        )
        .instrument(span)
        .await?;

        let records = outcomes.len();
        let failed_records = outcomes.iter().filter(|(_, failed)| *failed).count();
        let values = outcomes.into_iter().map(|(value, _)| value).collect();
        table.set_column(&output_key, values)?;
        storage.write(&table)?;

        Ok((output_key, records, failed_records))
    }
}
