//! Config snapshot export: one row reflecting the run's configuration.
//!
//! Field access is defensive: optional values degrade to empty strings so
//! a sparse configuration can never fail the write. Uses the csv crate for
//! quoting (the stock list is itself comma-joined).

use std::path::Path;

use anyhow::{Context, Result};

use backlab_core::RunConfiguration;

use super::{format_runtime, RunTiming};

pub fn write(path: &Path, config: &RunConfiguration, timing: &RunTiming) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create config CSV {}", path.display()))?;

    writer.write_record([
        "start_time",
        "end_time",
        "init_capital",
        "benchmark",
        "strategy_file",
        "actual_start_time",
        "actual_end_time",
        "total_runtime_seconds",
        "total_runtime_formatted",
        "stock_list",
        "min_volume",
        "kline_period",
        "dividend_type",
    ])?;

    writer.write_record([
        config.start_date.to_string(),
        config.end_date.to_string(),
        format!("{:.2}", config.init_capital),
        config.benchmark.clone().unwrap_or_default(),
        config.strategy_ref.clone(),
        timing.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        timing.finished_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        format!("{:.2}", timing.runtime_secs),
        format_runtime(timing.runtime_secs),
        config.universe.join(","),
        config.min_volume.to_string(),
        config.kline_period.as_str().to_string(),
        config.dividend_type.clone(),
    ])?;

    writer.flush()?;
    Ok(())
}
