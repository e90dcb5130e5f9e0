//! job-sentinel CLI
//!
//! Local execution entry point, meant to be started by an external scheduler.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use sentinel::{
    error::Result,
    models::{Config, RunStatistics},
    pipeline::Pipeline,
    storage::SeenStore,
};

/// job-sentinel - Job posting discovery and alerts
#[derive(Parser, Debug)]
#[command(
    name = "job-sentinel",
    version,
    about = "Discovers new job postings and sends alerts"
)]

struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, filter, deduplicate and notify (default)
    Run,

    /// Show seen-postings store statistics
    Stats {
        /// Window for the recent count (default: store.stats_window_days)
        #[arg(long)]
        days: Option<u32>,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn print_run_summary(stats: &RunStatistics) {
    log::info!("{}", "=".repeat(60));
    log::info!("RUN STATISTICS");
    for (label, value) in stats.summary_items() {
        log::info!("{:<22}{}", format!("{label}:"), value);
    }
    for (source, count) in &stats.fetched_by_source {
        log::info!("  {source}: {count}");
    }
    for warning in &stats.source_warnings {
        log::warn!("  {warning}");
    }
    log::info!("{}", "=".repeat(60));
}

async fn run(config: &Config) -> Result<ExitCode> {
    config.validate()?;
    let pipeline = Pipeline::from_config(config)?;

    match pipeline.run().await {
        Ok(stats) => {
            print_run_summary(&stats);
            log::info!("Run complete!");
            Ok(ExitCode::SUCCESS)
        }
        Err(aborted) => {
            log::error!("{}", aborted);
            print_run_summary(&aborted.stats);
            pipeline
                .notifier()
                .notify_error(&format!("Fatal error: {}", aborted.source))
                .await;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn show_stats(config: &Config, days: Option<u32>) -> Result<()> {
    let store = SeenStore::open(
        &config.store.path,
        Duration::from_millis(config.store.busy_timeout_ms),
    )?;
    let stats = store.stats(days.unwrap_or(config.store.stats_window_days))?;

    println!("{}", "=".repeat(60));
    println!("DATABASE STATISTICS");
    println!("{}", "=".repeat(60));
    println!("Total postings tracked: {}", stats.total_seen);
    println!(
        "Postings (last {} days): {}",
        stats.window_days, stats.seen_in_window
    );
    if !stats.by_source.is_empty() {
        println!("\nPostings by source:");
        for (source, count) in &stats.by_source {
            println!("  {source}: {count}");
        }
    }
    println!("{}", "=".repeat(60));
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load_or_default(&cli.config) {
        Ok(config) => config.with_env_overrides(),
        Err(e) => {
            init_logging(cli.verbose, "info");
            log::error!("Failed to load {}: {}", cli.config.display(), e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(cli.verbose, &config.logging.level);

    log::info!("job-sentinel starting...");
    if cli.config.exists() {
        log::info!("Loaded configuration from {}", cli.config.display());
    } else {
        log::warn!("{} not found. Using defaults.", cli.config.display());
    }

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config).await,
        Command::Stats { days } => show_stats(&config, days).map(|()| ExitCode::SUCCESS),
        Command::Validate => {
            log::info!("Validating configuration...");
            config.validate().map(|()| {
                log::info!("✓ Config OK");
                ExitCode::SUCCESS
            })
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
