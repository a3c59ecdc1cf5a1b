//! The headless API facade and the shared run orchestration.
//!
//! `run_backtest` is the single externally callable headless entry point:
//! it builds a `HeadlessInteraction`, runs validator + execution core +
//! artifact writer in sequence, then parses the run directory back into a
//! `BacktestResult`. `execute_run` is the mode-agnostic inner layer the
//! front-end bridge reuses with its own interaction variant. Neither
//! imports any UI code; headless execution must work without a display.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{Local, NaiveDate, NaiveDateTime};
use thiserror::Error;

use backlab_core::{
    CancelToken, Engine, HeadlessInteraction, LogLevel, MarketData, PeriodMismatchError,
    RunConfiguration, RunReport, RuntimeInteraction, Strategy, TerminalState,
};

use crate::artifacts::{write_artifact_set, ArtifactPaths, RunRecord, RunTiming};
use crate::config_file::load_config;
use crate::data::{
    load_market_data, BarProvider, CsvBarCache, LoadError, LoadOptions, SyntheticProvider,
};
use crate::result::{parse_backtest_dir, BacktestResult, ParseError, REQUIRED_FILES};
use crate::strategies::resolve;

/// Errors surfaced by the headless API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad configuration or an unresolvable strategy reference; the run
    /// never starts.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Headless fail-fast abort from the period validator.
    #[error(transparent)]
    PeriodMismatch(#[from] PeriodMismatchError),
    /// A required file is absent from a completed run directory. Internal
    /// consistency fault; never silently defaulted.
    #[error("missing required artifact: {}", .0.display())]
    MissingArtifact(PathBuf),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("artifact write failed: {0}")]
    Artifact(String),
}

impl From<ParseError> for ApiError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::MissingArtifact(path) | ParseError::MissingDir(path) => {
                ApiError::MissingArtifact(path)
            }
            other => ApiError::Artifact(other.to_string()),
        }
    }
}

/// Options for the headless entry point.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Continue with a warning instead of failing fast on period mismatch.
    pub allow_period_mismatch: bool,
    /// Override the configuration's data-initialization switch.
    pub init_data_enabled: Option<bool>,
    /// Bar cache directory.
    pub data_dir: PathBuf,
    /// Root under which per-run output directories are created.
    pub results_root: PathBuf,
    /// Fill cache misses from the deterministic synthetic provider.
    pub synthetic_data: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            allow_period_mismatch: false,
            init_data_enabled: None,
            data_dir: PathBuf::from("data"),
            results_root: PathBuf::from("backtest_results"),
            synthetic_data: false,
        }
    }
}

/// Outcome of `execute_run`: the engine report plus where artifacts went.
#[derive(Debug)]
pub struct ExecutedRun {
    pub report: RunReport,
    /// `None` when the validator aborted before the timeline.
    pub output_dir: Option<PathBuf>,
    pub artifact_paths: Option<ArtifactPaths>,
}

/// Fast, deterministic period-policy enforcement.
///
/// Runs before any data initialization so headless callers get the typed
/// policy error without paying for a data load. The engine's validator
/// re-checks against the loaded data and owns the interactive branch.
pub fn precheck_period_policy(config: &RunConfiguration) -> Result<(), PeriodMismatchError> {
    if config.allow_period_mismatch {
        return Ok(());
    }
    match backlab_core::detect_mismatch(config.kline_period, config.trigger) {
        Some(details) => Err(PeriodMismatchError { details }),
        None => Ok(()),
    }
}

fn run_dir_name(strategy_ref: &str, start: NaiveDate, end: NaiveDate, stamp: NaiveDateTime) -> String {
    let hash = blake3::hash(strategy_ref.as_bytes()).to_hex();
    format!(
        "strategy_{}_{}_{}_{}",
        &hash.as_str()[..8],
        start.format("%Y%m%d"),
        end.format("%Y%m%d"),
        stamp.format("%Y%m%d_%H%M%S")
    )
}

fn verify_artifacts(run_dir: &Path) -> Result<(), ApiError> {
    for name in REQUIRED_FILES {
        let path = run_dir.join(name);
        if !path.is_file() {
            return Err(ApiError::MissingArtifact(path));
        }
    }
    Ok(())
}

/// Run validator + execution core + artifact writer with the given
/// interaction variant.
///
/// Artifacts are written for every run that entered its timeline —
/// completed, failed, or cancelled alike — against whatever partial state
/// exists. A validator abort ends the run before any artifact is written.
pub fn execute_run(
    config: &RunConfiguration,
    data: &MarketData,
    strategy: &mut dyn Strategy,
    interaction: &dyn RuntimeInteraction,
    results_root: &Path,
    cancel: &CancelToken,
) -> Result<ExecutedRun, ApiError> {
    config
        .validate()
        .map_err(|e| ApiError::InvalidInput(e.to_string()))?;

    let started_at = Local::now().naive_local();
    let clock = Instant::now();

    let mut engine = Engine::new();
    let report = engine.run(config, data, strategy, interaction, cancel);

    if report.terminal == TerminalState::Aborted {
        return Ok(ExecutedRun {
            report,
            output_dir: None,
            artifact_paths: None,
        });
    }

    let finished_at = Local::now().naive_local();
    let timing = RunTiming {
        started_at,
        finished_at,
        runtime_secs: clock.elapsed().as_secs_f64(),
    };

    let benchmark_series = config
        .benchmark
        .as_deref()
        .and_then(|code| data.close_series(code, config.start_date, config.end_date));
    if config.benchmark.is_some() && benchmark_series.is_none() {
        interaction.log(
            LogLevel::Error,
            "benchmark series unavailable; benchmark.csv will carry only its header",
        );
    }

    let run_dir = results_root.join(run_dir_name(
        &config.strategy_ref,
        config.start_date,
        config.end_date,
        started_at,
    ));
    let record = RunRecord {
        config,
        snapshot: &report.snapshot,
        benchmark: benchmark_series.as_deref(),
        timing: &timing,
    };
    let paths =
        write_artifact_set(&run_dir, &record).map_err(|e| ApiError::Artifact(e.to_string()))?;
    verify_artifacts(&run_dir)?;

    interaction.open_result(&run_dir);

    Ok(ExecutedRun {
        report,
        output_dir: Some(run_dir),
        artifact_paths: Some(paths),
    })
}

/// Headless run against pre-loaded market data and a concrete strategy.
pub fn run_backtest_with(
    config: &RunConfiguration,
    data: &MarketData,
    strategy: &mut dyn Strategy,
    results_root: &Path,
) -> Result<BacktestResult, ApiError> {
    let interaction = HeadlessInteraction::new(config.mismatch_policy(), config.defaults.clone());
    let executed = execute_run(
        config,
        data,
        strategy,
        &interaction,
        results_root,
        &CancelToken::new(),
    )?;
    finish(executed)
}

/// The single headless entry point: load config and data, resolve the
/// strategy reference, run, and parse the artifact set.
pub fn run_backtest(
    config_path: &Path,
    strategy_ref: &str,
    opts: &RunOptions,
) -> Result<BacktestResult, ApiError> {
    let mut config = load_config(config_path).map_err(|e| ApiError::InvalidInput(e.to_string()))?;
    if opts.allow_period_mismatch {
        config.allow_period_mismatch = true;
    }
    if opts.init_data_enabled.is_some() {
        config.init_data_enabled = opts.init_data_enabled;
    }
    if !strategy_ref.is_empty() {
        config.strategy_ref = strategy_ref.to_string();
    }

    precheck_period_policy(&config)?;

    let mut strategy =
        resolve(&config.strategy_ref).map_err(|e| ApiError::InvalidInput(e.to_string()))?;

    let cache = CsvBarCache::new(&opts.data_dir);
    let synthetic = SyntheticProvider::default();
    let provider: Option<&dyn BarProvider> = if opts.synthetic_data {
        Some(&synthetic)
    } else {
        None
    };
    let load_opts = LoadOptions {
        start: config.start_date,
        end: config.end_date,
        init_data: config.init_data(),
    };
    let data = load_market_data(
        &config.universe,
        config.benchmark.as_deref(),
        &cache,
        provider,
        &load_opts,
    )?;

    run_backtest_with(&config, &data, strategy.as_mut(), &opts.results_root)
}

fn finish(executed: ExecutedRun) -> Result<BacktestResult, ApiError> {
    match executed.report.terminal {
        TerminalState::Aborted => match executed.report.mismatch {
            Some(details) => Err(ApiError::PeriodMismatch(PeriodMismatchError { details })),
            None => Err(ApiError::InvalidInput(
                "run aborted before the timeline began".to_string(),
            )),
        },
        terminal => {
            let output_dir = executed
                .output_dir
                .ok_or_else(|| ApiError::Artifact("run finished without an output directory".to_string()))?;
            let mut result = parse_backtest_dir(&output_dir)?;
            result.terminal_state = terminal;
            result.error_summary = executed.report.summary.error.clone();
            Ok(result)
        }
    }
}
