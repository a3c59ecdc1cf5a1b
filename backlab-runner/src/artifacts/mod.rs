//! Artifact writer: the fixed five-file output contract.
//!
//! Given a possibly partial execution snapshot, writes `trades.csv`,
//! `daily_stats.csv`, `summary.csv`, `benchmark.csv`, and `config.csv` to
//! the run directory. This is the single place allowed to substitute
//! defaults for missing upstream data; it only errors on genuine I/O
//! failure, never on empty or partial state.

mod benchmark;
mod config_snapshot;
mod daily_stats;
mod summary;
mod trades;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};

use backlab_core::{ExecutionSnapshot, RunConfiguration};

pub use summary::{compute_summary, SummaryRow};

/// Wall-clock bounds of the run, for the config snapshot.
#[derive(Debug, Clone)]
pub struct RunTiming {
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
    pub runtime_secs: f64,
}

/// Everything the writer needs, read-only.
pub struct RunRecord<'a> {
    pub config: &'a RunConfiguration,
    pub snapshot: &'a ExecutionSnapshot,
    /// Benchmark close series; `None` means the fetch failed and only the
    /// header is written.
    pub benchmark: Option<&'a [(NaiveDate, f64)]>,
    pub timing: &'a RunTiming,
}

/// Paths of the written artifact set.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub trades: PathBuf,
    pub daily_stats: PathBuf,
    pub summary: PathBuf,
    pub benchmark: PathBuf,
    pub config: PathBuf,
}

/// Write the complete artifact set into `run_dir`, creating it if needed.
pub fn write_artifact_set(run_dir: &Path, record: &RunRecord<'_>) -> Result<ArtifactPaths> {
    std::fs::create_dir_all(run_dir)
        .with_context(|| format!("failed to create run directory {}", run_dir.display()))?;

    let paths = ArtifactPaths {
        trades: run_dir.join("trades.csv"),
        daily_stats: run_dir.join("daily_stats.csv"),
        summary: run_dir.join("summary.csv"),
        benchmark: run_dir.join("benchmark.csv"),
        config: run_dir.join("config.csv"),
    };

    trades::write(&paths.trades, &record.snapshot.trades)?;
    daily_stats::write(
        &paths.daily_stats,
        &record.snapshot.daily_stats,
        record.config.start_date,
    )?;
    summary::write(
        &paths.summary,
        &record.snapshot.daily_stats,
        record.config.init_capital,
    )?;
    benchmark::write(&paths.benchmark, record.benchmark)?;
    config_snapshot::write(&paths.config, record.config, record.timing)?;

    Ok(paths)
}

/// Human-readable runtime, mirroring the log format.
pub fn format_runtime(secs: f64) -> String {
    let hours = (secs / 3600.0) as u64;
    let minutes = ((secs % 3600.0) / 60.0) as u64;
    let seconds = secs % 60.0;
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds:.2}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:.2}s")
    } else {
        format!("{seconds:.2}s")
    }
}
