//! Crucible command line.

mod config;
mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crucible_core::{CaseStatus, SuiteKind};
use crucible_runtime::{Orchestrator, ProviderRouter, ReqwestTransport, RuntimeConfig};

use config::{read_cases, RunFile};

#[derive(Parser)]
#[command(name = "crucible", version)]
#[command(about = "Generate text with an LLM and evaluate it for bias, safety, and relevance")]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every case through generation and evaluation
    Run {
        /// YAML run file
        #[arg(short, long)]
        config: PathBuf,

        /// One case per line
        #[arg(long)]
        cases: PathBuf,

        /// Cases in flight at once (overrides the run file)
        #[arg(long)]
        concurrency: Option<usize>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// List the criteria a suite evaluates
    Criteria {
        #[arg(long)]
        suite: SuiteKind,
    },
    /// List the built-in providers
    Providers,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Commands::Run {
            config,
            cases,
            concurrency,
            format,
        } => run(config, cases, concurrency, format).await,
        Commands::Criteria { suite } => {
            print!("{}", report::render_criteria(suite));
            Ok(())
        }
        Commands::Providers => {
            let transport = ReqwestTransport::new(RuntimeConfig::default().request_timeout)?;
            let router = ProviderRouter::with_defaults(Arc::new(transport));
            print!("{}", report::render_providers(&router));
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout carries only the report.
fn init_tracing(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("crucible=debug,crucible_core=debug,crucible_runtime=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .context("Failed to initialize logging")
}

async fn run(
    config: PathBuf,
    cases: PathBuf,
    concurrency: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let run_file = RunFile::load(&config)?;

    let mut runtime = run_file.runtime.clone();
    if let Some(limit) = concurrency {
        runtime.concurrency_limit = limit;
    }
    runtime.validate()?;

    let case_text = std::fs::read_to_string(&cases)
        .with_context(|| format!("Failed to read cases {}", cases.display()))?;
    let inputs = read_cases(run_file.suite, &case_text)?;

    let options = Arc::new(run_file.provider_options()?);
    let router = Arc::new(ProviderRouter::with_defaults(Arc::new(runtime.transport()?)));
    let runner = Arc::new(run_file.pipeline(router, options)?);

    tracing::info!(
        suite = %run_file.suite,
        provider = %run_file.provider.id,
        cases = inputs.len(),
        "Running suite"
    );

    let (mut updates, handle) = Orchestrator::from_config(&runtime).spawn(inputs, runner);
    while let Some(update) = updates.recv().await {
        if update.status() != CaseStatus::Queued {
            eprintln!("{}", report::progress_line(&update));
        }
    }
    let run = handle.await.context("Run task panicked")?;

    match format {
        OutputFormat::Text => print!("{}", report::render_text(&run)),
        OutputFormat::Json => println!("{}", report::render_json(&run)?),
    }
    Ok(())
}
