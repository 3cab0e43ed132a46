//! csv-median CLI — running median of prices across a directory of CSV files.
//!
//! Reads a TOML config (`[main]` with `input`, `output`, `filename_mask`),
//! ingests every matching `.csv` file in parallel, and writes each change of
//! the running median to `<output>/median_result.csv`.
//!
//! Exit status: 0 on success, 2 on a fatal error.

mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use median_runner::{run_pipeline, AppConfig, RunSummary, TracingObserver, DEFAULT_CONFIG_FILE};
use tracing::{error, info};

const FATAL_EXIT_CODE: u8 = 2;

#[derive(Parser)]
#[command(
    name = "csv-median",
    about = "Running median of prices across a directory of CSV files"
)]
struct Cli {
    /// Path to the TOML config file. Defaults to ./config.toml.
    #[arg(short, long, visible_alias = "cfg")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Worker threads for file ingestion. Defaults to one per logical CPU.
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    info!("starting csv-median");
    match run(cli) {
        Ok(summary) => {
            info!(
                files = summary.files_matched,
                failed = summary.files_failed,
                skipped_lines = summary.lines_skipped,
                records = summary.records_loaded,
                changes = summary.changes_written,
                "run complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("fatal error: {e:#}");
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}

fn run(cli: Cli) -> Result<RunSummary> {
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure ingestion thread pool")?;
    }

    let config_path = cli.config.unwrap_or_else(|| {
        let path = PathBuf::from(DEFAULT_CONFIG_FILE);
        info!(path = %path.display(), "config not specified, using default");
        path
    });

    let config = AppConfig::from_file(&config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    info!(input = %config.input_dir.display(), "input dir");
    info!(output = %config.output_dir.display(), "output dir");

    let summary = run_pipeline(&config, &TracingObserver)?;
    Ok(summary)
}
