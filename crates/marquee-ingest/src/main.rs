//! Marquee Ingest - title dump import tool

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use marquee_common::logging::{init_logging, LogConfig, LogLevel};
use marquee_ingest::{
    build_runtime, run_to_completion, DirectoryEnumerator, FilterCriteria, ImportConfig,
    JsonLinesSink, LogSink, Orchestrator,
};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "marquee-ingest")]
#[command(author, version, about = "Marquee title dump import tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import every dump file of a directory
    Import(ImportArgs),
}

#[derive(clap::Args, Debug)]
struct ImportArgs {
    /// TOML configuration file
    #[arg(short, long, env = "MARQUEE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory containing the dump files
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Only publish titles of this type (requires --genre)
    #[arg(long, requires = "genre")]
    title_type: Option<String>,

    /// Only publish titles with this genre (requires --title-type)
    #[arg(long, requires = "title_type")]
    genre: Option<String>,

    /// Header lines to skip in every file
    #[arg(long)]
    skip: Option<usize>,

    /// Files processed concurrently
    #[arg(long)]
    lanes: Option<usize>,

    /// Lines parsed concurrently within one file
    #[arg(long)]
    parse_parallelism: Option<usize>,

    /// Publishes in flight
    #[arg(long)]
    writes: Option<usize>,

    /// Write accepted records as JSON lines to this file instead of logging them
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Runtime worker threads (defaults to the number of cores)
    #[arg(long)]
    worker_threads: Option<usize>,
}

impl ImportArgs {
    fn apply(&self, config: &mut ImportConfig) -> Result<()> {
        if let Some(dir) = &self.dir {
            config.import_directory = dir.clone();
        }
        match (&self.title_type, &self.genre) {
            (Some(title_type), Some(genre)) => {
                config.criteria = Some(FilterCriteria::new(title_type, genre));
            },
            (None, None) => {},
            _ => bail!("--title-type and --genre must be given together"),
        }
        if let Some(skip) = self.skip {
            config.lines_to_skip = skip;
        }
        if let Some(lanes) = self.lanes {
            config.concurrent_files = lanes;
        }
        if let Some(parallelism) = self.parse_parallelism {
            config.parse_parallelism = parallelism;
        }
        if let Some(writes) = self.writes {
            config.concurrent_writes = writes;
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbose flag
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("marquee-ingest")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    match cli.command {
        Command::Import(args) => import(args),
    }
}

fn import(args: ImportArgs) -> Result<()> {
    let mut config =
        ImportConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config)?;
    config.validate().context("Invalid configuration")?;

    let runtime = build_runtime(args.worker_threads)?;
    let enumerator = DirectoryEnumerator::new(&config.import_directory, &config.file_extension);

    let report = match &args.output {
        Some(path) => run_to_completion(runtime, async {
            let sink = open_output(path).await?;
            Orchestrator::new(config, enumerator, Arc::new(sink)).run().await
        }),
        None => run_to_completion(runtime, async {
            Orchestrator::new(config, enumerator, Arc::new(LogSink)).run().await
        }),
    }?;

    info!(
        run_id = %report.run_id,
        published = report.stats.records_published,
        "Ingestion complete"
    );
    Ok(())
}

/// Open the JSON lines output, logging a failure as the end of the run
async fn open_output(path: &Path) -> marquee_common::Result<JsonLinesSink> {
    JsonLinesSink::create(path)
        .await
        .inspect_err(|e| error!(error = %e, path = %path.display(), "Import failed"))
}
