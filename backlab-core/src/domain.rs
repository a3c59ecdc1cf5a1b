//! Domain types shared across the engine: bars, trades, daily statistics,
//! run summaries, and the fee schedule applied to fills.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Single OHLCV bar for one symbol on one trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Side of an executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "buy",
            TradeAction::Sell => "sell",
        }
    }
}

/// One executed trade, including fees and the post-trade account state.
///
/// Field set matches the persisted trade tape schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub datetime: NaiveDateTime,
    pub code: String,
    pub action: TradeAction,
    pub price: f64,
    pub volume: i64,
    pub amount: f64,
    pub commission: f64,
    pub stamp_tax: f64,
    pub transfer_fee: f64,
    pub flow_fee: f64,
    pub total_asset: f64,
    pub cash: f64,
    pub market_value: f64,
}

/// End-of-day account statistics, one per simulated trading day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyStat {
    pub date: NaiveDate,
    pub total_asset: f64,
    pub cash: f64,
    pub market_value: f64,
    /// Fractional return versus the previous day's total asset.
    pub daily_return: f64,
    /// Benchmark close for the day, when the benchmark series covers it.
    pub benchmark_close: Option<f64>,
    /// Number of open positions at the close.
    pub positions: usize,
}

/// Final status of a run. After a terminal state is reached no further
/// timeline steps occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalState {
    /// Timeline ran to the end.
    Completed,
    /// Validator stopped the run before the timeline began.
    Aborted,
    /// A strategy callback failed mid-run; partial state was kept.
    Failed,
    /// An external cancellation request stopped the run between steps.
    Cancelled,
}

impl TerminalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalState::Completed => "completed",
            TerminalState::Aborted => "aborted",
            TerminalState::Failed => "failed",
            TerminalState::Cancelled => "cancelled",
        }
    }
}

/// Summary handed to `RuntimeInteraction::on_finished` at the end of every
/// run, whatever the terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub terminal: TerminalState,
    pub trading_days: usize,
    pub trade_count: usize,
    pub final_equity: f64,
    /// Recorded error summary for failed/cancelled runs.
    pub error: Option<String>,
}

/// Per-trade fee schedule.
///
/// Commission applies both ways with a minimum charge; stamp tax applies to
/// sells only; transfer fee is proportional to traded amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub commission_rate: f64,
    pub min_commission: f64,
    pub stamp_tax_rate: f64,
    pub transfer_fee_rate: f64,
    pub flow_fee: f64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            commission_rate: 0.00025,
            min_commission: 5.0,
            stamp_tax_rate: 0.0005,
            transfer_fee_rate: 0.00001,
            flow_fee: 0.0,
        }
    }
}

/// Itemized fees for a single fill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeFees {
    pub commission: f64,
    pub stamp_tax: f64,
    pub transfer_fee: f64,
    pub flow_fee: f64,
}

impl TradeFees {
    pub fn total(&self) -> f64 {
        self.commission + self.stamp_tax + self.transfer_fee + self.flow_fee
    }
}

impl FeeSchedule {
    /// Compute fees for a fill of `amount` (price * volume).
    pub fn fees_for(&self, action: TradeAction, amount: f64) -> TradeFees {
        let commission = (amount * self.commission_rate).max(self.min_commission);
        let stamp_tax = match action {
            TradeAction::Sell => amount * self.stamp_tax_rate,
            TradeAction::Buy => 0.0,
        };
        TradeFees {
            commission,
            stamp_tax,
            transfer_fee: amount * self.transfer_fee_rate,
            flow_fee: self.flow_fee,
        }
    }
}
