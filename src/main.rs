// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use the_corpusmill::config::consts::DEFAULT_OUTPUT_DIR;
use the_corpusmill::config::{load_and_validate_config, Registries, Settings};
use the_corpusmill::engine::Framework;
use the_corpusmill::errors::{ErrorHandler, ErrorReporter};
use the_corpusmill::frameworks::PretrainingFramework;
use the_corpusmill::operators::microops::MICRO_OPS;
use the_corpusmill::traits::Lang;

#[derive(Parser)]
#[command(name = "corpusmill", version, about = "Staged corpus processing for LLM training data")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pretraining framework over a JSONL file or a directory of text files
    Run {
        /// Input file, or a directory to flatten into a raw corpus first
        #[arg(short, long)]
        input: PathBuf,
        /// Snapshot directory; the default gets a timestamped run directory
        #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
        output: PathBuf,
        /// YAML, JSON or TOML settings file
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        max_workers: Option<usize>,
        /// Keep only the first N records (0 keeps all)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List the registered operators, pipelines and micro-operations
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match Cli::parse().command {
        Command::Run {
            input,
            output,
            config,
            max_workers,
            limit,
        } => run(input, output, config, max_workers, limit).await,
        Command::List => list(),
    }
}

async fn run(
    input: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    max_workers: Option<usize>,
    limit: Option<usize>,
) -> Result<()> {
    let mut settings = match &config {
        Some(path) => load_and_validate_config(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if max_workers.is_some() {
        settings.max_workers = max_workers;
    }
    if let Some(limit) = limit {
        settings.limit = limit;
    }

    let ttl = Duration::from_secs(settings.registry.cache_ttl_secs);
    let registries = Registries::with_builtins(ttl)?;
    let reporter = Arc::new(ErrorReporter::new());
    let handler = ErrorHandler::new(Arc::clone(&reporter), settings.retry.to_policy());

    let mut framework = Framework::new(
        PretrainingFramework::new(),
        input,
        output,
        settings,
        Arc::new(registries),
        handler,
    )?;
    tracing::info!("{}", framework.get_desc(Lang::En));

    let outcome = match framework.prepare() {
        Ok(()) => framework.run().await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            println!("{}", serde_json::to_string_pretty(&framework.get_metrics())?);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", serde_json::to_string_pretty(&reporter.summary())?);
            Err(e.into())
        }
    }
}

fn list() -> Result<()> {
    let registries = Registries::with_builtins(Duration::from_secs(60))?;

    println!("operators:");
    for name in registries.operators.names() {
        let operator = registries.operators.create(&name, &Default::default())?;
        println!("  {:<16} {}", name, operator.description(Lang::En));
    }
    println!("pipelines:");
    for name in registries.pipelines.names() {
        let pipeline = registries.pipelines.create(&name, &Default::default())?;
        println!("  {:<16} {}", name, pipeline.description(Lang::En));
    }
    println!("micro-operations:");
    for name in MICRO_OPS {
        println!("  {}", name);
    }
    Ok(())
}
