//! Run summary export: always exactly one row.
//!
//! With fewer than two stat rows the performance fields cannot be computed
//! and default to zero; the row is still written.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use backlab_core::DailyStat;

/// The single summary row. Returns are in percent; annualization assumes
/// 250 trading days.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub init_capital: f64,
    pub final_capital: f64,
    pub total_return: f64,
    pub annual_return: f64,
    pub max_drawdown: f64,
    pub trade_days: usize,
}

pub fn compute_summary(stats: &[DailyStat], init_capital: f64) -> SummaryRow {
    let trade_days = stats.len();
    let final_capital = stats.last().map(|s| s.total_asset).unwrap_or(init_capital);

    if trade_days < 2 || init_capital <= 0.0 {
        return SummaryRow {
            init_capital,
            final_capital,
            total_return: 0.0,
            annual_return: 0.0,
            max_drawdown: 0.0,
            trade_days,
        };
    }

    let total_return = (final_capital - init_capital) / init_capital * 100.0;
    let total_return_decimal = final_capital / init_capital - 1.0;
    let annual_return =
        ((1.0 + total_return_decimal).powf(250.0 / trade_days as f64) - 1.0) * 100.0;

    let mut peak = f64::MIN;
    let mut max_drawdown: f64 = 0.0;
    for stat in stats {
        peak = peak.max(stat.total_asset);
        if peak > 0.0 {
            max_drawdown = max_drawdown.max((peak - stat.total_asset) / peak * 100.0);
        }
    }

    SummaryRow {
        init_capital,
        final_capital,
        total_return,
        annual_return,
        max_drawdown,
        trade_days,
    }
}

pub fn write(path: &Path, stats: &[DailyStat], init_capital: f64) -> Result<()> {
    let row = compute_summary(stats, init_capital);
    let mut file = File::create(path)
        .with_context(|| format!("failed to create summary CSV {}", path.display()))?;

    writeln!(
        file,
        "init_capital,final_capital,total_return,annual_return,max_drawdown,trade_days"
    )?;
    writeln!(
        file,
        "{:.4},{:.4},{:.4},{:.4},{:.4},{}",
        row.init_capital,
        row.final_capital,
        row.total_return,
        row.annual_return,
        row.max_drawdown,
        row.trade_days
    )?;

    Ok(())
}
