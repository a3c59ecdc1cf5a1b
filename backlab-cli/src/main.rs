//! Backlab CLI — headless front end for the backtest engine.
//!
//! Commands:
//! - `run` — execute a backtest from a JSON config file and print the
//!   artifact summary
//! - `seed-data` — materialize deterministic synthetic bars into the CSV
//!   cache
//! - `smoke` — dual-mode self-check: run a synthetic backtest end-to-end
//!   and verify the five-file artifact contract

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use backlab_core::TerminalState;
use backlab_runner::{
    run_backtest, BarProvider, CsvBarCache, RunOptions, SyntheticProvider, REQUIRED_FILES,
};

#[derive(Parser)]
#[command(name = "backlab", about = "Backlab CLI — dual-mode backtesting engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a JSON config file.
    Run {
        /// Path to the JSON config document.
        #[arg(long)]
        config: PathBuf,

        /// Strategy reference; overrides the config's `strategy_file`.
        #[arg(long, default_value = "")]
        strategy: String,

        /// Continue with a warning on period mismatch.
        #[arg(long, default_value_t = false)]
        allow_period_mismatch: bool,

        /// Override the data-initialization switch (true/false).
        #[arg(long)]
        init_data: Option<bool>,

        /// Bar cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Root for per-run output directories.
        #[arg(long, default_value = "backtest_results")]
        results_dir: PathBuf,

        /// Fill cache misses with deterministic synthetic data.
        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
    /// Materialize synthetic bars into the CSV cache.
    SeedData {
        /// Symbols to seed (e.g. 000001.SZ 000300.SH).
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD).
        #[arg(long)]
        end: String,

        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
    /// Run the dual-mode smoke check against synthetic data.
    Smoke {
        /// Optional config to smoke against instead of the built-in one.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Strategy reference for the provided config.
        #[arg(long, default_value = "buy_and_hold")]
        strategy: String,

        /// Continue with a warning on period mismatch.
        #[arg(long, default_value_t = false)]
        allow_period_mismatch: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            strategy,
            allow_period_mismatch,
            init_data,
            data_dir,
            results_dir,
            synthetic,
        } => cmd_run(
            config,
            strategy,
            allow_period_mismatch,
            init_data,
            data_dir,
            results_dir,
            synthetic,
        ),
        Commands::SeedData {
            symbols,
            start,
            end,
            data_dir,
        } => cmd_seed_data(symbols, &start, &end, data_dir),
        Commands::Smoke {
            config,
            strategy,
            allow_period_mismatch,
        } => cmd_smoke(config, &strategy, allow_period_mismatch),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    config: PathBuf,
    strategy: String,
    allow_period_mismatch: bool,
    init_data: Option<bool>,
    data_dir: PathBuf,
    results_dir: PathBuf,
    synthetic: bool,
) -> Result<()> {
    let opts = RunOptions {
        allow_period_mismatch,
        init_data_enabled: init_data,
        data_dir,
        results_root: results_dir,
        synthetic_data: synthetic,
    };
    let result = run_backtest(&config, &strategy, &opts)?;

    println!("output_dir: {}", result.output_dir.display());
    println!("terminal_state: {}", result.terminal_state.as_str());
    if let Some(error) = &result.error_summary {
        println!("error: {error}");
    }
    println!(
        "trades: {}  trading_days: {}",
        result.trades.row_count(),
        result.daily_stats.row_count()
    );
    println!(
        "total_return: {:.2}%  annual_return: {:.2}%  max_drawdown: {:.2}%",
        result.metrics.total_return, result.metrics.annual_return, result.metrics.max_drawdown
    );

    if result.terminal_state != TerminalState::Completed {
        bail!("run ended in state '{}'", result.terminal_state.as_str());
    }
    Ok(())
}

fn cmd_seed_data(symbols: Vec<String>, start: &str, end: &str, data_dir: PathBuf) -> Result<()> {
    let start: NaiveDate = start.parse()?;
    let end: NaiveDate = end.parse()?;
    if end < start {
        bail!("end date precedes start date");
    }

    let cache = CsvBarCache::new(&data_dir);
    let provider = SyntheticProvider::default();
    for symbol in &symbols {
        let bars = provider.fetch(symbol, start, end)?;
        cache.write(symbol, &bars)?;
        println!("seeded {symbol}: {} bars -> {}", bars.len(), cache.path(symbol).display());
    }
    Ok(())
}

fn cmd_smoke(config: Option<PathBuf>, strategy: &str, allow_period_mismatch: bool) -> Result<()> {
    let (config_path, opts) = match config {
        Some(path) => (
            path,
            RunOptions {
                allow_period_mismatch,
                synthetic_data: true,
                ..RunOptions::default()
            },
        ),
        None => {
            let scratch =
                std::env::temp_dir().join(format!("backlab_smoke_{}", std::process::id()));
            let _ = std::fs::remove_dir_all(&scratch);
            std::fs::create_dir_all(&scratch)?;
            let config_path = scratch.join("smoke.json");
            std::fs::write(
                &config_path,
                r#"{
    "strategy_file": "buy_and_hold",
    "stock_list": ["000001.SZ"],
    "data": {"kline_period": "1d"},
    "backtest": {
        "start": "2024-01-02",
        "end": "2024-03-29",
        "benchmark": "sh.000300",
        "trigger": {"type": "1d"}
    }
}"#,
            )?;
            (
                config_path,
                RunOptions {
                    allow_period_mismatch,
                    data_dir: scratch.join("data"),
                    results_root: scratch.join("results"),
                    synthetic_data: true,
                    ..RunOptions::default()
                },
            )
        }
    };

    let result = run_backtest(&config_path, strategy, &opts)?;

    let missing: Vec<&str> = REQUIRED_FILES
        .iter()
        .copied()
        .filter(|name| !result.output_dir.join(name).is_file())
        .collect();

    println!("output_dir: {}", result.output_dir.display());
    println!("missing_files: {missing:?}");
    if !missing.is_empty() {
        bail!("artifact contract violated: missing {missing:?}");
    }
    println!("smoke: ok");
    Ok(())
}
