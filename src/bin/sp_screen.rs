//! sp-screen - screen a symbol list for superperformance growth moves
//!
//! Reads the watchlist, loads each symbol's daily bars from `<data-dir>/<SYMBOL>.csv`,
//! runs the screener in a bounded worker pool and prints a summary plus the top moves.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use sp_screener::prelude::*;
use sp_screener::{params::parse_overrides, report};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "sp-screen")]
#[command(about = "Screen daily price histories for explosive growth moves and superperformers", long_about = None)]
#[command(version)]
struct Cli {
    /// Watchlist CSV (header row, symbol in the first column)
    #[arg(short, long)]
    symbols: PathBuf,

    /// Directory holding one `<SYMBOL>.csv` per symbol
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// JSON config file; missing fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override a parameter, e.g. `--set end_decline=0.35` (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Maximum symbols analyzed at once
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Rows shown in the results table
    #[arg(long, default_value = "25")]
    top: usize,

    /// Write all moves as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write all moves as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Log file directory
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

fn setup_logging(verbose: bool, log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let log_filename = format!(
        "sp-screen_{}.log",
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = log_dir.join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::never(log_dir, &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_names(verbose)
        .with_ansi(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Log file: {}", log_path.display());
    Ok(())
}

fn load_config(cli: &Cli) -> Result<ScreenerConfig> {
    let config = match &cli.config {
        Some(path) => ScreenerConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ScreenerConfig::default(),
    };

    let overrides = parse_overrides(&cli.overrides).context("Invalid --set override")?;
    let mut config = config
        .with_overrides(&overrides)
        .context("Invalid parameter override")?;

    if let Some(n) = cli.max_concurrent {
        config.max_concurrent = Period::new(n).context("--max-concurrent must be > 0")?;
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, &cli.log_dir)?;

    let config = load_config(&cli)?;
    let screener = ScreenerBuilder::new()
        .config(config)
        .build()
        .context("Invalid screener configuration")?;

    let symbols = load_symbols(&cli.symbols)
        .with_context(|| format!("Failed to load symbols from {}", cli.symbols.display()))?;
    if symbols.is_empty() {
        anyhow::bail!("No symbols in {}", cli.symbols.display());
    }

    info!(
        symbols = symbols.len(),
        data_dir = %cli.data_dir.display(),
        max_concurrent = screener.config().max_concurrent.get(),
        "Starting screen"
    );

    let started = Instant::now();
    let source = CsvBarSource::new(&cli.data_dir);
    let (results, errors) = scan_parallel(&screener, &source, &symbols)?;
    let elapsed = started.elapsed();

    for e in &errors {
        warn!(symbol = %e.symbol, error = %e.error, "analysis failed");
    }

    let moves = report::collect_moves(&results);
    let summary = report::ScreenSummary::from_scan(symbols.len(), &results, &errors);

    println!("\n{}", "=".repeat(90));
    println!("SCREEN SUMMARY ({:.1}s)", elapsed.as_secs_f64());
    println!("{}", "=".repeat(90));
    println!("{}", summary);

    if moves.is_empty() {
        println!("\nNo growth moves found");
    } else {
        println!("\nTOP GROWTH MOVES");
        print!("{}", report::render_table(&moves, cli.top));
    }
    println!("{}", "=".repeat(90));

    if let Some(path) = &cli.json {
        report::save_json(&moves, path)
            .with_context(|| format!("Failed to save JSON to {}", path.display()))?;
        println!("Results saved to {}", path.display());
    }
    if let Some(path) = &cli.csv {
        report::save_csv(&moves, path)
            .with_context(|| format!("Failed to save CSV to {}", path.display()))?;
        println!("Results saved to {}", path.display());
    }

    Ok(())
}
