//! The frozen strategy callback contract and the context handed to it.
//!
//! Strategies implement four hooks called in a fixed order per simulated
//! day: `on_pre_market`, `on_bar`, `on_post_market`, with `init` once
//! before the timeline. Signatures are stable; the engine owns the order.

use std::collections::HashMap;

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{FeeSchedule, TradeAction, TradeRecord};
use crate::market::MarketData;

/// Error raised from a strategy callback. Contained by the engine: it ends
/// the run in a failed terminal state instead of propagating raw.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct StrategyError(pub String);

/// One open position.
#[derive(Debug, Clone, Default)]
pub struct Position {
    pub volume: i64,
    pub avg_cost: f64,
}

/// Cash and positions evolving over the run.
#[derive(Debug, Clone)]
pub struct Account {
    pub cash: f64,
    pub positions: HashMap<String, Position>,
}

impl Account {
    pub fn new(init_capital: f64) -> Self {
        Self {
            cash: init_capital,
            positions: HashMap::new(),
        }
    }

    /// Market value of all open positions at the given date's closes.
    /// Positions without a bar that day are valued at average cost.
    pub fn market_value(&self, data: &MarketData, date: NaiveDate) -> f64 {
        self.positions
            .iter()
            .filter(|(_, p)| p.volume > 0)
            .map(|(code, p)| {
                let price = data.close(code, date).unwrap_or(p.avg_cost);
                price * p.volume as f64
            })
            .sum()
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.values().filter(|p| p.volume > 0).count()
    }
}

/// Execution context passed to every strategy callback.
///
/// Orders fill at the current day's close. Rejected orders (no price, not
/// enough cash or volume, below the minimum lot) are recorded as notes the
/// engine logs through the interaction boundary; they never fail the run.
pub struct StrategyContext<'a> {
    date: NaiveDate,
    data: &'a MarketData,
    universe: &'a [String],
    account: &'a mut Account,
    fees: &'a FeeSchedule,
    min_volume: i64,
    trades: &'a mut Vec<TradeRecord>,
    notes: Vec<String>,
}

impl<'a> StrategyContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        date: NaiveDate,
        data: &'a MarketData,
        universe: &'a [String],
        account: &'a mut Account,
        fees: &'a FeeSchedule,
        min_volume: i64,
        trades: &'a mut Vec<TradeRecord>,
    ) -> Self {
        Self {
            date,
            data,
            universe,
            account,
            fees,
            min_volume,
            trades,
            notes: Vec::new(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn universe(&self) -> &[String] {
        self.universe
    }

    pub fn close(&self, code: &str) -> Option<f64> {
        self.data.close(code, self.date)
    }

    /// Closes for the last `len` trading days of `code`, oldest first.
    pub fn history(&self, code: &str, len: usize) -> Vec<f64> {
        self.data.history(code, self.date, len)
    }

    pub fn cash(&self) -> f64 {
        self.account.cash
    }

    pub fn position(&self, code: &str) -> i64 {
        self.account
            .positions
            .get(code)
            .map(|p| p.volume)
            .unwrap_or(0)
    }

    pub fn equity(&self) -> f64 {
        self.account.cash + self.account.market_value(self.data, self.date)
    }

    /// Buy `volume` of `code` at today's close. Returns whether the order
    /// filled.
    pub fn buy(&mut self, code: &str, volume: i64) -> bool {
        self.execute(code, TradeAction::Buy, volume)
    }

    /// Sell `volume` of `code` at today's close. Returns whether the order
    /// filled.
    pub fn sell(&mut self, code: &str, volume: i64) -> bool {
        self.execute(code, TradeAction::Sell, volume)
    }

    fn execute(&mut self, code: &str, action: TradeAction, volume: i64) -> bool {
        if volume < self.min_volume {
            self.notes.push(format!(
                "{} {} x{volume} rejected: below minimum volume {}",
                action.as_str(),
                code,
                self.min_volume
            ));
            return false;
        }
        let Some(price) = self.close(code) else {
            self.notes.push(format!(
                "{} {} x{volume} rejected: no price for {}",
                action.as_str(),
                code,
                self.date
            ));
            return false;
        };

        let amount = price * volume as f64;
        let fees = self.fees.fees_for(action, amount);

        match action {
            TradeAction::Buy => {
                if self.account.cash < amount + fees.total() {
                    self.notes.push(format!(
                        "buy {code} x{volume} rejected: insufficient cash"
                    ));
                    return false;
                }
                self.account.cash -= amount + fees.total();
                let position = self.account.positions.entry(code.to_string()).or_default();
                let held_cost = position.avg_cost * position.volume as f64;
                position.volume += volume;
                position.avg_cost = (held_cost + amount) / position.volume as f64;
            }
            TradeAction::Sell => {
                let held = self.position(code);
                if held < volume {
                    self.notes.push(format!(
                        "sell {code} x{volume} rejected: holding only {held}"
                    ));
                    return false;
                }
                self.account.cash += amount - fees.total();
                if let Some(position) = self.account.positions.get_mut(code) {
                    position.volume -= volume;
                }
            }
        }

        let market_value = self.account.market_value(self.data, self.date);
        self.trades.push(TradeRecord {
            datetime: self.date.and_hms_opt(15, 0, 0).expect("valid close time"),
            code: code.to_string(),
            action,
            price,
            volume,
            amount,
            commission: fees.commission,
            stamp_tax: fees.stamp_tax,
            transfer_fee: fees.transfer_fee,
            flow_fee: fees.flow_fee,
            total_asset: self.account.cash + market_value,
            cash: self.account.cash,
            market_value,
        });
        true
    }

    pub(crate) fn take_notes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notes)
    }
}

/// The frozen callback contract.
pub trait Strategy {
    /// Called once before the timeline begins.
    fn init(&mut self, ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError>;

    /// Called at the start of each simulated trading day.
    fn on_pre_market(&mut self, _ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        Ok(())
    }

    /// Called once per bar of the simulated day.
    fn on_bar(&mut self, ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError>;

    /// Called at the end of each simulated trading day.
    fn on_post_market(&mut self, _ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn data_with_price(price: f64) -> MarketData {
        let mut data = MarketData::new();
        data.insert_series(
            "000001.SZ",
            vec![Bar {
                date: day(2),
                open: price,
                high: price,
                low: price,
                close: price,
                volume: 10_000,
            }],
        );
        data
    }

    fn context<'a>(
        data: &'a MarketData,
        universe: &'a [String],
        account: &'a mut Account,
        fees: &'a FeeSchedule,
        trades: &'a mut Vec<TradeRecord>,
    ) -> StrategyContext<'a> {
        StrategyContext::new(day(2), data, universe, account, fees, 100, trades)
    }

    #[test]
    fn buy_then_sell_round_trip() {
        let data = data_with_price(10.0);
        let universe = vec!["000001.SZ".to_string()];
        let mut account = Account::new(100_000.0);
        let fees = FeeSchedule::default();
        let mut trades = Vec::new();
        let mut ctx = context(&data, &universe, &mut account, &fees, &mut trades);

        assert!(ctx.buy("000001.SZ", 1_000));
        assert_eq!(ctx.position("000001.SZ"), 1_000);
        assert!(ctx.sell("000001.SZ", 1_000));
        assert_eq!(ctx.position("000001.SZ"), 0);

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].action, TradeAction::Buy);
        assert_eq!(trades[1].action, TradeAction::Sell);
        assert!(trades[1].stamp_tax > 0.0);
        // Round trip costs fees, so cash ends below the start.
        assert!(account.cash < 100_000.0);
    }

    #[test]
    fn oversell_is_rejected_with_note() {
        let data = data_with_price(10.0);
        let universe = vec!["000001.SZ".to_string()];
        let mut account = Account::new(100_000.0);
        let fees = FeeSchedule::default();
        let mut trades = Vec::new();
        let mut ctx = context(&data, &universe, &mut account, &fees, &mut trades);

        assert!(!ctx.sell("000001.SZ", 500));
        let notes = ctx.take_notes();
        assert!(trades.is_empty());
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains("rejected"));
    }

    #[test]
    fn insufficient_cash_is_rejected() {
        let data = data_with_price(10.0);
        let universe = vec!["000001.SZ".to_string()];
        let mut account = Account::new(1_000.0);
        let fees = FeeSchedule::default();
        let mut trades = Vec::new();
        let mut ctx = context(&data, &universe, &mut account, &fees, &mut trades);

        assert!(!ctx.buy("000001.SZ", 1_000));
        assert!(trades.is_empty());
        assert_eq!(account.cash, 1_000.0);
    }

    #[test]
    fn below_min_volume_is_rejected() {
        let data = data_with_price(10.0);
        let universe = vec!["000001.SZ".to_string()];
        let mut account = Account::new(100_000.0);
        let fees = FeeSchedule::default();
        let mut trades = Vec::new();
        let mut ctx = context(&data, &universe, &mut account, &fees, &mut trades);

        assert!(!ctx.buy("000001.SZ", 50));
        assert!(trades.is_empty());
    }

    #[test]
    fn trade_record_carries_post_trade_state() {
        let data = data_with_price(10.0);
        let universe = vec!["000001.SZ".to_string()];
        let mut account = Account::new(100_000.0);
        let fees = FeeSchedule::default();
        let mut trades = Vec::new();
        let mut ctx = context(&data, &universe, &mut account, &fees, &mut trades);

        ctx.buy("000001.SZ", 1_000);
        let record = &trades[0];
        assert_eq!(record.market_value, 10_000.0);
        assert!((record.total_asset - (record.cash + record.market_value)).abs() < 1e-9);
    }
}
