// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::hooks::{Hook, Hooks, FrameworkEvent};
use super::operator::{ManagedOperator, OperatorInfo};
use super::pipeline::{Pipeline, PipelineInfo};
use super::state::FrameworkState;
use crate::config::consts::{DEFAULT_OUTPUT_DIR, RUN_DIR_TIMESTAMP_FORMAT};
use crate::config::{ConfigMap, Registries, Settings};
use crate::errors::{CorpusError, ErrorContext, ErrorHandler, Result};
use crate::observability::messages::framework::{
    FrameworkCompleted, FrameworkControlRequested, FrameworkFailed, FrameworkInitialized,
    FrameworkPrepared, FrameworkStarted, StageCompleted, StageStarted,
};
use crate::observability::messages::StructuredLog;
use crate::storage::{FileStorage, StorageStats};
use crate::traits::{FrameworkBlueprint, Lang, StageOperator};

/// Run counters. The rate fields are derived by [`Framework::get_metrics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameworkMetrics {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub files_processed: u64,
    pub records_processed: u64,
    pub tokens_processed: u64,
    pub errors_count: u64,
    pub pipeline_steps_completed: u64,
    /// Seconds spent inside `run()`.
    pub total_processing_time: f64,
    pub execution_duration: f64,
    pub files_per_second: f64,
    pub tokens_per_second: f64,
}

/// One finished stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub stage: String,
    pub step: i64,
    pub input_key: String,
    pub output_key: String,
    pub records: usize,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameworkProgress {
    pub state: FrameworkState,
    pub current_step: i64,
    pub stages_completed: usize,
    pub last_output_key: Option<String>,
    pub stages: Vec<StageRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameworkInfo {
    pub name: String,
    pub description: String,
    pub framework_type: String,
    pub version: String,
    pub state: FrameworkState,
    pub created_at: DateTime<Utc>,
    pub input_file: PathBuf,
    pub output_dir: PathBuf,
    pub max_workers: usize,
    pub limit: usize,
    pub required_operators: Vec<String>,
    pub required_pipelines: Vec<String>,
    pub operators: Vec<OperatorInfo>,
    pub pipelines: Vec<PipelineInfo>,
    pub storage: StorageStats,
}

/// Cloneable handle for pausing, resuming and stopping a run from another
/// task.
///
/// Only the advertised state changes. The runtime looks at it between
/// stages: a paused run waits there until resumed or stopped, and a stopped
/// run ends with [`CorpusError::Stopped`]. A stage already in flight always
/// runs to completion.
#[derive(Clone)]
pub struct FrameworkControl {
    name: Arc<str>,
    state: Arc<watch::Sender<FrameworkState>>,
    cancel: CancellationToken,
    hooks: Arc<Hooks<FrameworkEvent>>,
}

impl FrameworkControl {
    fn new(name: &str) -> Self {
        let (state, _) = watch::channel(FrameworkState::Initialized);
        Self {
            name: Arc::from(name),
            state: Arc::new(state),
            cancel: CancellationToken::new(),
            hooks: Arc::new(Hooks::new(name)),
        }
    }

    pub fn state(&self) -> FrameworkState {
        *self.state.borrow()
    }

    fn set_state(&self, state: FrameworkState) {
        self.state.send_replace(state);
    }

    /// Cancelled by [`FrameworkControl::stop`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Pause a running framework. Returns false when it is not running.
    pub fn pause(&self) -> bool {
        let paused = self.state.send_if_modified(|state| {
            if *state == FrameworkState::Running {
                *state = FrameworkState::Paused;
                true
            } else {
                false
            }
        });
        if paused {
            self.log_control("pause");
            self.hooks.fire(FrameworkEvent::OnPause, None);
        }
        paused
    }

    /// Resume a paused framework. Returns false when it is not paused.
    pub fn resume(&self) -> bool {
        let resumed = self.state.send_if_modified(|state| {
            if *state == FrameworkState::Paused {
                *state = FrameworkState::Running;
                true
            } else {
                false
            }
        });
        if resumed {
            self.log_control("resume");
            self.hooks.fire(FrameworkEvent::OnResume, None);
        }
        resumed
    }

    /// Move to `Stopped` from any state.
    pub fn stop(&self) {
        self.set_state(FrameworkState::Stopped);
        self.cancel.cancel();
        self.log_control("stop");
    }

    fn log_control(&self, action: &str) {
        tracing::info!(
            "{}",
            FrameworkControlRequested {
                framework: &self.name,
                action,
                state: self.state(),
            }
        );
    }

    /// Called before every stage.
    async fn checkpoint(&self, stage: &str) -> Result<()> {
        let stopped = || CorpusError::Stopped(stage.to_string());
        if self.cancel.is_cancelled() || self.state() == FrameworkState::Stopped {
            return Err(stopped());
        }
        if self.state() == FrameworkState::Paused {
            let mut rx = self.state.subscribe();
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(stopped()),
                changed = rx.wait_for(|state| *state != FrameworkState::Paused) => {
                    changed
                        .map(|_| ())
                        .map_err(|e| CorpusError::Internal(format!("state channel closed: {}", e)))?;
                }
            }
            if self.state() == FrameworkState::Stopped {
                return Err(stopped());
            }
        }
        Ok(())
    }
}

/// Everything a blueprint works with: storage, the named operators and
/// pipelines, the registries they come from and the run settings.
pub struct FrameworkContext {
    name: String,
    input_file: PathBuf,
    output_dir: PathBuf,
    settings: Settings,
    storage: FileStorage,
    operators: BTreeMap<String, ManagedOperator<dyn StageOperator>>,
    pipelines: BTreeMap<String, Pipeline>,
    registries: Arc<Registries>,
    error_handler: ErrorHandler,
    control: FrameworkControl,
    metrics: FrameworkMetrics,
    stages: Vec<StageRecord>,
}

impl FrameworkContext {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_file(&self) -> &Path {
        &self.input_file
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Re-point the run at a different original input, e.g. a corpus
    /// generated during `on_init`.
    pub fn set_input_file(&mut self, path: impl Into<PathBuf>) {
        self.input_file = path.into();
        self.storage.set_input_file(&self.input_file);
    }

    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut FileStorage {
        &mut self.storage
    }

    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    pub fn error_handler(&self) -> &ErrorHandler {
        &self.error_handler
    }

    pub fn control(&self) -> &FrameworkControl {
        &self.control
    }

    pub fn stages(&self) -> &[StageRecord] {
        &self.stages
    }

    /// Add (or replace) an operator under its own name.
    pub fn add_operator(&mut self, operator: ManagedOperator<dyn StageOperator>) {
        self.operators.insert(operator.name().to_string(), operator);
    }

    /// Add (or replace) a pipeline under its own name.
    pub fn add_pipeline(&mut self, pipeline: Pipeline) {
        self.pipelines.insert(pipeline.name().to_string(), pipeline);
    }

    /// Build `name` from the operator registry, configure it with `config`
    /// and add it.
    pub fn create_operator(&mut self, name: &str, config: &ConfigMap) -> Result<()> {
        let inner = self.registries.operators.create(name, config)?;
        let mut operator = ManagedOperator::new(inner, self.error_handler.clone());
        operator.configure(config)?;
        self.add_operator(operator);
        Ok(())
    }

    /// Build `name` from the pipeline registry with the run's worker count
    /// and add it.
    pub fn create_pipeline(&mut self, name: &str, config: ConfigMap) -> Result<()> {
        let blueprint = self.registries.pipelines.create(name, &config)?;
        let pipeline = Pipeline::new(
            blueprint,
            self.settings.get_max_workers(),
            0,
            config,
            &self.registries.micro_ops,
            self.error_handler.clone(),
        )?;
        self.add_pipeline(pipeline);
        Ok(())
    }

    pub fn operator(&self, name: &str) -> Option<&ManagedOperator<dyn StageOperator>> {
        self.operators.get(name)
    }

    pub fn operator_mut(&mut self, name: &str) -> Option<&mut ManagedOperator<dyn StageOperator>> {
        self.operators.get_mut(name)
    }

    pub fn pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.get(name)
    }

    pub fn has_operator(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    pub fn has_pipeline(&self, name: &str) -> bool {
        self.pipelines.contains_key(name)
    }

    /// Count files fed into the run.
    pub fn record_files(&mut self, files: u64) {
        self.metrics.files_processed += files;
    }

    /// Count an error the blueprint recovered from.
    pub fn record_error(&mut self) {
        self.metrics.errors_count += 1;
    }

    /// Count tokens produced by the run.
    pub fn record_tokens(&mut self, tokens: u64) {
        self.metrics.tokens_processed += tokens;
    }

    /// Run the operator `name` as the next stage. Returns its output key.
    pub async fn run_operator(
        &mut self,
        name: &str,
        input_key: &str,
        output_key: Option<&str>,
    ) -> Result<String> {
        self.control.checkpoint(name).await?;
        let operator = self
            .operators
            .get(name)
            .ok_or_else(|| CorpusError::MissingRequirement {
                kind: "operator",
                name: name.to_string(),
            })?;

        let storage = self.storage.step();
        let step = storage.operator_step();
        let msg = StageStarted {
            framework: &self.name,
            stage: name,
            step,
            input_key,
        };
        msg.log();
        let span = msg.span("stage");

        let started = Instant::now();
        let key = operator
            .execute(storage, input_key, output_key)
            .instrument(span)
            .await?;
        self.complete_stage(name, step, input_key, &key, started.elapsed());
        Ok(key)
    }

    /// Run the pipeline `name` as the next stage. Returns its output key.
    pub async fn run_pipeline(
        &mut self,
        name: &str,
        input_key: &str,
        output_key: Option<&str>,
    ) -> Result<String> {
        self.control.checkpoint(name).await?;
        let pipeline = self
            .pipelines
            .get(name)
            .ok_or_else(|| CorpusError::MissingRequirement {
                kind: "pipeline",
                name: name.to_string(),
            })?;

        let storage = self.storage.step();
        let step = storage.operator_step();
        let msg = StageStarted {
            framework: &self.name,
            stage: name,
            step,
            input_key,
        };
        msg.log();
        let span = msg.span("stage");

        let started = Instant::now();
        let key = pipeline
            .run(storage, input_key, output_key)
            .instrument(span)
            .await?;
        self.complete_stage(name, step, input_key, &key, started.elapsed());
        Ok(key)
    }

    fn complete_stage(
        &mut self,
        stage: &str,
        step: i64,
        input_key: &str,
        output_key: &str,
        elapsed: Duration,
    ) {
        let records = self
            .storage
            .get_file_info(Some(step + 1))
            .map(|meta| meta.record_count)
            .unwrap_or(0);
        self.metrics.pipeline_steps_completed += 1;
        self.metrics.records_processed += records as u64;
        self.stages.push(StageRecord {
            stage: stage.to_string(),
            step,
            input_key: input_key.to_string(),
            output_key: output_key.to_string(),
            records,
            elapsed_secs: elapsed.as_secs_f64(),
        });
        tracing::info!(
            "{}",
            StageCompleted {
                framework: &self.name,
                stage,
                output_key,
                elapsed,
            }
        );
    }
}

/// Lifecycle runtime around a [`FrameworkBlueprint`].
///
/// Construction checks the input, creates the output directory (a
/// timestamped run directory under the default `./output`), opens storage
/// there and calls the blueprint's `on_init`. `prepare()` builds the
/// components and checks the required names; `run()` executes the stages.
/// Any failure moves the framework to `Failed`, counts toward
/// `errors_count`, fires `OnError` and is returned to the caller.
pub struct Framework<B: FrameworkBlueprint> {
    blueprint: B,
    ctx: FrameworkContext,
    created_at: DateTime<Utc>,
}

impl<B: FrameworkBlueprint> Framework<B> {
    pub fn new(
        blueprint: B,
        input_file: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        settings: Settings,
        registries: Arc<Registries>,
        error_handler: ErrorHandler,
    ) -> Result<Self> {
        Self::with_hooks(
            blueprint,
            input_file,
            output_dir,
            settings,
            registries,
            error_handler,
            Vec::new(),
        )
    }

    /// Like [`Framework::new`], subscribing `hooks` before `BeforeInit` fires.
    pub fn with_hooks(
        mut blueprint: B,
        input_file: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        settings: Settings,
        registries: Arc<Registries>,
        error_handler: ErrorHandler,
        hooks: Vec<(FrameworkEvent, Hook)>,
    ) -> Result<Self> {
        let name = blueprint.name().to_string();
        let context = || ErrorContext::new("framework_init").with("framework", &name);

        let input_file = input_file.into();
        if !input_file.exists() {
            return error_handler.propagate(Err(CorpusError::InputNotFound(input_file)), context());
        }

        let output_dir = resolve_output_dir(output_dir.into());
        if let Err(e) = fs::create_dir_all(&output_dir) {
            return error_handler.propagate(Err(CorpusError::io(&output_dir, e)), context());
        }

        let storage = FileStorage::new(
            &input_file,
            &output_dir,
            &settings.storage,
            error_handler.clone(),
        );
        let storage = error_handler.propagate(storage, context())?;

        let control = FrameworkControl::new(&name);
        for (event, hook) in hooks {
            control.hooks.add(event, hook);
        }

        let mut ctx = FrameworkContext {
            name,
            input_file,
            output_dir,
            settings,
            storage,
            operators: BTreeMap::new(),
            pipelines: BTreeMap::new(),
            registries,
            error_handler,
            control,
            metrics: FrameworkMetrics::default(),
            stages: Vec::new(),
        };

        ctx.control.hooks.fire(FrameworkEvent::BeforeInit, None);
        if let Err(error) = blueprint.on_init(&mut ctx) {
            ctx.control.set_state(FrameworkState::Failed);
            ctx.metrics.errors_count += 1;
            ctx.control.hooks.fire(FrameworkEvent::OnError, Some(&error));
            let operation = ErrorContext::new("framework_init").with("framework", &ctx.name);
            return ctx.error_handler.propagate(Err(error), operation);
        }
        ctx.control.hooks.fire(FrameworkEvent::AfterInit, None);

        tracing::info!(
            "{}",
            FrameworkInitialized {
                framework: &ctx.name,
                version: B::VERSION,
                input: &ctx.input_file,
                output_dir: &ctx.output_dir,
            }
        );

        Ok(Self {
            blueprint,
            ctx,
            created_at: Utc::now(),
        })
    }

    pub fn name(&self) -> &str {
        &self.ctx.name
    }

    pub fn blueprint(&self) -> &B {
        &self.blueprint
    }

    pub fn context(&self) -> &FrameworkContext {
        &self.ctx
    }

    pub fn state(&self) -> FrameworkState {
        self.ctx.control.state()
    }

    pub fn get_desc(&self, lang: Lang) -> String {
        self.blueprint.description(lang)
    }

    pub fn add_hook(&self, event: FrameworkEvent, hook: Hook) {
        self.ctx.control.hooks.add(event, hook);
    }

    /// Handle for pausing or stopping the run from elsewhere.
    pub fn control(&self) -> FrameworkControl {
        self.ctx.control.clone()
    }

    pub fn pause(&self) -> bool {
        self.ctx.control.pause()
    }

    pub fn resume(&self) -> bool {
        self.ctx.control.resume()
    }

    pub fn stop(&self) {
        self.ctx.control.stop()
    }

    /// Build the components and check that every required name is present.
    pub fn prepare(&mut self) -> Result<()> {
        let state = self.state();
        if !matches!(state, FrameworkState::Initialized | FrameworkState::Configured) {
            return Err(self.invalid_state("prepare", state));
        }

        self.ctx.control.hooks.fire(FrameworkEvent::BeforePrepare, None);
        self.ctx.control.set_state(FrameworkState::Preparing);

        let result = self
            .blueprint
            .prepare_components(&mut self.ctx)
            .and_then(|_| self.validate_requirements());
        if let Err(error) = result {
            return self.fail("prepare", error);
        }

        self.ctx.control.set_state(FrameworkState::Configured);
        tracing::info!(
            "{}",
            FrameworkPrepared {
                framework: &self.ctx.name,
                operators: self.ctx.operators.len(),
                pipelines: self.ctx.pipelines.len(),
            }
        );
        self.ctx.control.hooks.fire(FrameworkEvent::AfterPrepare, None);
        Ok(())
    }

    fn validate_requirements(&self) -> Result<()> {
        if let Some(name) = B::REQUIRED_OPERATORS
            .iter()
            .find(|name| !self.ctx.has_operator(name))
        {
            return Err(CorpusError::MissingRequirement {
                kind: "operator",
                name: name.to_string(),
            });
        }
        if let Some(name) = B::REQUIRED_PIPELINES
            .iter()
            .find(|name| !self.ctx.has_pipeline(name))
        {
            return Err(CorpusError::MissingRequirement {
                kind: "pipeline",
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Execute every stage. Only valid once prepared.
    pub async fn run(&mut self) -> Result<B::Report> {
        let state = self.state();
        if state != FrameworkState::Configured {
            return Err(self.invalid_state("run", state));
        }

        self.ctx.control.set_state(FrameworkState::Running);
        self.ctx.metrics.start_time = Some(Utc::now());
        self.ctx.metrics.end_time = None;
        self.ctx.control.hooks.fire(FrameworkEvent::BeforeRun, None);

        let framework_type = B::FRAMEWORK_TYPE.to_string();
        let msg = FrameworkStarted {
            framework: &self.ctx.name,
            framework_type: &framework_type,
            max_workers: self.ctx.settings.get_max_workers(),
            limit: self.ctx.settings.limit,
        };
        msg.log();
        let span = msg.span("run");

        let started = Instant::now();
        let result = self
            .blueprint
            .execute_pipeline(&mut self.ctx)
            .instrument(span)
            .await;
        let elapsed = started.elapsed();
        self.ctx.metrics.total_processing_time += elapsed.as_secs_f64();
        self.ctx.metrics.end_time = Some(Utc::now());

        match result {
            Ok(report) => {
                if self.state() != FrameworkState::Stopped {
                    self.ctx.control.set_state(FrameworkState::Completed);
                }
                tracing::info!(
                    "{}",
                    FrameworkCompleted {
                        framework: &self.ctx.name,
                        stages: self.ctx.metrics.pipeline_steps_completed,
                        elapsed,
                    }
                );
                self.ctx.control.hooks.fire(FrameworkEvent::AfterRun, None);
                self.ctx.control.hooks.fire(FrameworkEvent::OnComplete, None);
                Ok(report)
            }
            Err(error) => self.fail("run", error),
        }
    }

    fn fail<T>(&mut self, phase: &str, error: CorpusError) -> Result<T> {
        let state = if matches!(error, CorpusError::Stopped(_)) {
            FrameworkState::Stopped
        } else {
            FrameworkState::Failed
        };
        self.ctx.control.set_state(state);
        self.ctx.metrics.errors_count += 1;
        tracing::error!(
            "{}",
            FrameworkFailed {
                framework: &self.ctx.name,
                phase,
                error: &error,
            }
        );
        self.ctx.control.hooks.fire(FrameworkEvent::OnError, Some(&error));
        self.ctx.error_handler.propagate(
            Err(error),
            ErrorContext::new(phase).with("framework", &self.ctx.name),
        )
    }

    fn invalid_state(&self, action: &'static str, state: FrameworkState) -> CorpusError {
        CorpusError::InvalidState {
            component: self.ctx.name.clone(),
            action,
            state: state.to_string(),
        }
    }

    /// Back to `Initialized`: storage rewinds to step -1, metrics and stage
    /// history are cleared and every component is reset. Components stay
    /// registered.
    pub fn reset(&mut self) {
        if self.ctx.control.cancel.is_cancelled() {
            self.ctx.control.cancel = CancellationToken::new();
        }
        self.ctx.control.set_state(FrameworkState::Initialized);
        self.ctx.storage.reset();
        self.ctx.metrics = FrameworkMetrics::default();
        self.ctx.stages.clear();
        for operator in self.ctx.operators.values() {
            operator.reset();
        }
        for pipeline in self.ctx.pipelines.values() {
            pipeline.reset();
        }
    }

    /// Counters plus derived duration and throughput.
    pub fn get_metrics(&self) -> FrameworkMetrics {
        let mut metrics = self.ctx.metrics.clone();
        if let Some(start) = metrics.start_time {
            let end = metrics.end_time.unwrap_or_else(Utc::now);
            metrics.execution_duration =
                (end - start).num_milliseconds().max(0) as f64 / 1000.0;
        }
        if metrics.execution_duration > 0.0 {
            metrics.files_per_second = metrics.files_processed as f64 / metrics.execution_duration;
            metrics.tokens_per_second =
                metrics.tokens_processed as f64 / metrics.execution_duration;
        }
        metrics
    }

    pub fn get_progress(&self) -> FrameworkProgress {
        FrameworkProgress {
            state: self.state(),
            current_step: self.ctx.storage.operator_step(),
            stages_completed: self.ctx.stages.len(),
            last_output_key: self.ctx.stages.last().map(|s| s.output_key.clone()),
            stages: self.ctx.stages.clone(),
        }
    }

    pub fn get_info(&self) -> FrameworkInfo {
        FrameworkInfo {
            name: self.ctx.name.clone(),
            description: self.get_desc(Lang::En),
            framework_type: B::FRAMEWORK_TYPE.to_string(),
            version: B::VERSION.to_string(),
            state: self.state(),
            created_at: self.created_at,
            input_file: self.ctx.input_file.clone(),
            output_dir: self.ctx.output_dir.clone(),
            max_workers: self.ctx.settings.get_max_workers(),
            limit: self.ctx.settings.limit,
            required_operators: B::REQUIRED_OPERATORS.iter().map(|s| s.to_string()).collect(),
            required_pipelines: B::REQUIRED_PIPELINES.iter().map(|s| s.to_string()).collect(),
            operators: self.ctx.operators.values().map(|op| op.get_info()).collect(),
            pipelines: self.ctx.pipelines.values().map(|p| p.get_info()).collect(),
            storage: self.ctx.storage.get_storage_stats(),
        }
    }
}

/// The default output directory gets a timestamped run directory inside it.
fn resolve_output_dir(output_dir: PathBuf) -> PathBuf {
    if output_dir == Path::new(DEFAULT_OUTPUT_DIR) {
        output_dir.join(Utc::now().format(RUN_DIR_TIMESTAMP_FORMAT).to_string())
    } else {
        output_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Table;
    use crate::traits::{Describe, FrameworkType};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    /// Appends "+" to every value of the input column.
    struct Suffix;

    impl Describe for Suffix {
        fn name(&self) -> &str {
            "suffix"
        }

        fn description(&self, _lang: Lang) -> String {
            "Appends a plus sign".to_string()
        }
    }

    #[async_trait]
    impl StageOperator for Suffix {
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
                .map(|v| json!(format!("{}+", v.as_str().unwrap_or_default())))
                .collect();
            table.set_column(&output_key, values)?;
            storage.write(&table)?;
            Ok(output_key)
        }
    }

    #[derive(Default)]
    struct TwoStage {
        skip_prepare: bool,
        stop_after_first: bool,
        pause_after_first: bool,
    }

    #[async_trait]
    impl FrameworkBlueprint for TwoStage {
        const FRAMEWORK_TYPE: FrameworkType = FrameworkType::Custom;
        const VERSION: &'static str = "0.1.0";
        const REQUIRED_OPERATORS: &'static [&'static str] = &["suffix"];
        const REQUIRED_PIPELINES: &'static [&'static str] = &[];

        type Report = Vec<String>;

        fn name(&self) -> &str {
            "two_stage"
        }

        fn description(&self, _lang: Lang) -> String {
            "Two suffix stages".to_string()
        }

        fn prepare_components(&mut self, ctx: &mut FrameworkContext) -> Result<()> {
            if self.skip_prepare {
                return Ok(());
            }
            ctx.create_operator("suffix", &ConfigMap::new())
        }

        async fn execute_pipeline(&mut self, ctx: &mut FrameworkContext) -> Result<Vec<String>> {
            let first = ctx.run_operator("suffix", "text", Some("first")).await?;
            if self.stop_after_first {
                ctx.control().stop();
            }
            if self.pause_after_first {
                let control = ctx.control().clone();
                assert!(control.pause());
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    control.resume();
                });
            }
            let second = ctx.run_operator("suffix", &first, Some("second")).await?;
            Ok(vec![first, second])
        }
    }

    fn registries() -> Arc<Registries> {
        let registries = Registries::new(Duration::from_secs(60));
        registries
            .operators
            .register(
                "suffix",
                Arc::new(|_| Ok(Box::new(Suffix) as Box<dyn StageOperator>)),
                None,
            )
            .unwrap();
        Arc::new(registries)
    }

    fn framework(dir: &TempDir, blueprint: TwoStage) -> Framework<TwoStage> {
        let input = dir.path().join("input.jsonl");
        std::fs::write(&input, "{\"text\":\"a\"}\n{\"text\":\"b\"}\n").unwrap();
        Framework::new(
            blueprint,
            &input,
            dir.path().join("out"),
            Settings::default(),
            registries(),
            ErrorHandler::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_missing_input_fails_construction() {
        let dir = TempDir::new().unwrap();
        let handler = ErrorHandler::default();
        let result = Framework::new(
            TwoStage::default(),
            dir.path().join("nope.jsonl"),
            dir.path().join("out"),
            Settings::default(),
            registries(),
            handler.clone(),
        );
        assert!(matches!(result, Err(CorpusError::InputNotFound(_))));
        assert_eq!(handler.reporter().len(), 1);
        assert!(!dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_full_run_threads_keys() {
        let dir = TempDir::new().unwrap();
        let mut fw = framework(&dir, TwoStage::default());
        assert_eq!(fw.state(), FrameworkState::Initialized);

        fw.prepare().unwrap();
        assert_eq!(fw.state(), FrameworkState::Configured);

        let keys = fw.run().await.unwrap();
        assert_eq!(keys, vec!["first", "second"]);
        assert_eq!(fw.state(), FrameworkState::Completed);

        let progress = fw.get_progress();
        assert_eq!(progress.stages_completed, 2);
        assert_eq!(progress.current_step, 1);
        assert_eq!(progress.last_output_key.as_deref(), Some("second"));

        let metrics = fw.get_metrics();
        assert_eq!(metrics.pipeline_steps_completed, 2);
        assert_eq!(metrics.records_processed, 4);
        assert_eq!(metrics.errors_count, 0);

        let table: Table = FileStorage::new(
            dir.path().join("out/corpusmill_cache_step_2.jsonl"),
            dir.path().join("out"),
            &Default::default(),
            ErrorHandler::default(),
        )
        .unwrap()
        .step()
        .read()
        .unwrap();
        assert_eq!(table.column("second"), vec![json!("a++"), json!("b++")]);

        let info = fw.get_info();
        assert_eq!(info.framework_type, "custom");
        assert_eq!(info.storage.total_files, 2);
        assert_eq!(info.operators[0].metrics.execution_count, 2);
    }

    #[tokio::test]
    async fn test_state_guards() {
        struct TestCase {
            name: &'static str,
            prepare_first: bool,
            expected_action: &'static str,
        }

        let test_cases = vec![
            TestCase {
                name: "run before prepare",
                prepare_first: false,
                expected_action: "run",
            },
            TestCase {
                name: "prepare after completion",
                prepare_first: true,
                expected_action: "prepare",
            },
        ];

        for tc in test_cases {
            let dir = TempDir::new().unwrap();
            let mut fw = framework(&dir, TwoStage::default());
            let err = if tc.prepare_first {
                fw.prepare().unwrap();
                fw.run().await.unwrap();
                fw.prepare().unwrap_err()
            } else {
                fw.run().await.unwrap_err()
            };
            match err {
                CorpusError::InvalidState { action, .. } => {
                    assert_eq!(action, tc.expected_action, "action for '{}'", tc.name)
                }
                other => panic!("unexpected error for '{}': {}", tc.name, other),
            }
        }
    }

    #[tokio::test]
    async fn test_missing_requirement_fails_prepare() {
        let dir = TempDir::new().unwrap();
        let mut fw = framework(
            &dir,
            TwoStage {
                skip_prepare: true,
                ..TwoStage::default()
            },
        );
        let errors = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = errors.clone();
        fw.add_hook(
            FrameworkEvent::OnError,
            Arc::new(move |_| {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }),
        );

        let err = fw.prepare().unwrap_err();
        assert_eq!(err.to_string(), "Required operator not found: suffix");
        assert_eq!(fw.state(), FrameworkState::Failed);
        assert_eq!(fw.get_metrics().errors_count, 1);
        assert_eq!(errors.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_between_stages() {
        let dir = TempDir::new().unwrap();
        let mut fw = framework(
            &dir,
            TwoStage {
                stop_after_first: true,
                ..TwoStage::default()
            },
        );
        fw.prepare().unwrap();

        let err = fw.run().await.unwrap_err();
        assert!(matches!(err, CorpusError::Stopped(ref stage) if stage == "suffix"));
        assert_eq!(fw.state(), FrameworkState::Stopped);
        assert_eq!(fw.get_progress().stages_completed, 1);

        fw.reset();
        assert_eq!(fw.state(), FrameworkState::Initialized);
        assert_eq!(fw.get_progress().current_step, -1);
    }

    #[tokio::test]
    async fn test_pause_waits_for_resume() {
        let dir = TempDir::new().unwrap();
        let mut fw = framework(
            &dir,
            TwoStage {
                pause_after_first: true,
                ..TwoStage::default()
            },
        );
        let pauses = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = pauses.clone();
        fw.add_hook(
            FrameworkEvent::OnResume,
            Arc::new(move |_| {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }),
        );
        fw.prepare().unwrap();

        let keys = fw.run().await.unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(fw.state(), FrameworkState::Completed);
        assert_eq!(pauses.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_control_only_pauses_running() {
        let control = FrameworkControl::new("fw");
        assert!(!control.pause());
        control.set_state(FrameworkState::Running);
        assert!(control.pause());
        assert!(!control.pause());
        assert!(control.resume());
        control.stop();
        assert_eq!(control.state(), FrameworkState::Stopped);
        assert!(control.cancellation_token().is_cancelled());
    }

    #[test]
    fn test_default_output_dir_gets_run_subdirectory() {
        let resolved = resolve_output_dir(PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(resolved.parent(), Some(Path::new(DEFAULT_OUTPUT_DIR)));
        let stamp = resolved.file_name().and_then(|s| s.to_str()).unwrap();
        assert_eq!(stamp.len(), "20250101-120000".len());

        let custom = PathBuf::from("/tmp/corpus-out");
        assert_eq!(resolve_output_dir(custom.clone()), custom);
    }

    #[test]
    fn test_with_hooks_sees_init_events() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("input.jsonl");
        std::fs::write(&input, "{\"text\":\"a\"}\n").unwrap();
        let seen = Arc::new(std::sync::Mutex::new(Vec::<Value>::new()));

        let mut hooks: Vec<(FrameworkEvent, Hook)> = Vec::new();
        for event in [FrameworkEvent::BeforeInit, FrameworkEvent::AfterInit] {
            let sink = seen.clone();
            hooks.push((
                event,
                Arc::new(move |_| {
                    sink.lock().unwrap().push(json!(event.to_string()));
                    Ok(())
                }),
            ));
        }

        Framework::with_hooks(
            TwoStage::default(),
            &input,
            dir.path().join("out"),
            Settings::default(),
            registries(),
            ErrorHandler::default(),
            hooks,
        )
        .unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![json!("before_init"), json!("after_init")]
        );
    }
}
