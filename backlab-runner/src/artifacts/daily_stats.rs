//! Daily statistics export.
//!
//! A run aborted before any full day still yields a schema-compatible
//! file: one default row instead of an empty body.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use backlab_core::DailyStat;

pub fn write(path: &Path, stats: &[DailyStat], fallback_date: NaiveDate) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("failed to create daily stats CSV {}", path.display()))?;

    writeln!(
        file,
        "date,total_asset,cash,market_value,daily_return,benchmark_close,positions"
    )?;

    if stats.is_empty() {
        writeln!(file, "{fallback_date},0.0000,0.0000,0.0000,0.000000,,0")?;
        return Ok(());
    }

    for stat in stats {
        let benchmark = stat
            .benchmark_close
            .map(|c| format!("{c:.4}"))
            .unwrap_or_default();
        writeln!(
            file,
            "{},{:.4},{:.4},{:.4},{:.6},{},{}",
            stat.date,
            stat.total_asset,
            stat.cash,
            stat.market_value,
            stat.daily_return,
            benchmark,
            stat.positions
        )?;
    }

    Ok(())
}
