//! Trade tape export. Header is always written, even with zero trades.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use backlab_core::TradeRecord;

pub fn write(path: &Path, trades: &[TradeRecord]) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("failed to create trades CSV {}", path.display()))?;

    writeln!(
        file,
        "datetime,code,action,price,volume,amount,commission,stamp_tax,transfer_fee,flow_fee,total_asset,cash,market_value"
    )?;

    for trade in trades {
        writeln!(
            file,
            "{},{},{},{:.4},{},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4}",
            trade.datetime.format("%Y-%m-%d %H:%M:%S"),
            trade.code,
            trade.action.as_str(),
            trade.price,
            trade.volume,
            trade.amount,
            trade.commission,
            trade.stamp_tax,
            trade.transfer_fee,
            trade.flow_fee,
            trade.total_asset,
            trade.cash,
            trade.market_value
        )?;
    }

    Ok(())
}
