//! Backtest execution core.
//!
//! Drives the simulated timeline day-by-day, invoking the frozen strategy
//! callbacks in a fixed order and recording trades and daily statistics
//! into run-local state. Everything observable goes through the
//! `RuntimeInteraction` boundary; the core never learns which variant is
//! bound.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;

use crate::config::RunConfiguration;
use crate::domain::{DailyStat, FeeSchedule, RunSummary, TerminalState, TradeRecord};
use crate::interaction::{LogLevel, RuntimeInteraction};
use crate::market::MarketData;
use crate::strategy::{Account, Strategy, StrategyContext, StrategyError};
use crate::validator::{check_period_consistency, PeriodMismatch, PeriodMismatchError, ValidationOutcome};

/// Shared flag for external cancellation requests, polled between
/// simulated steps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Clear a pending request, e.g. before reusing the token for the
    /// next run.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Read-only snapshot of run state handed to the artifact writer at
/// finalize time.
#[derive(Debug, Clone)]
pub struct ExecutionSnapshot {
    pub trades: Vec<TradeRecord>,
    pub daily_stats: Vec<DailyStat>,
    pub error: Option<String>,
}

/// Everything a caller needs after `Engine::run` returns.
#[derive(Debug)]
pub struct RunReport {
    pub terminal: TerminalState,
    pub summary: RunSummary,
    pub snapshot: ExecutionSnapshot,
    /// Present when the validator aborted the run.
    pub mismatch: Option<PeriodMismatch>,
}

/// Mutable state owned exclusively by the core during one run. Reset at
/// run boundaries; never shared across concurrent runs.
struct ExecutionState {
    current_date: Option<NaiveDate>,
    account: Account,
    trades: Vec<TradeRecord>,
    daily_stats: Vec<DailyStat>,
    terminal_error: Option<String>,
}

impl ExecutionState {
    fn new(init_capital: f64) -> Self {
        Self {
            current_date: None,
            account: Account::new(init_capital),
            trades: Vec::new(),
            daily_stats: Vec::new(),
            terminal_error: None,
        }
    }
}

/// Clears the shared running flag on every exit path, including early
/// returns and panics.
struct RunningGuard {
    flag: Arc<AtomicBool>,
}

impl RunningGuard {
    fn engage(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self { flag: Arc::clone(flag) }
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// How the timeline ended, before summary assembly.
struct TimelineEnd {
    terminal: TerminalState,
    mismatch: Option<PeriodMismatch>,
}

/// The backtest engine. One instance may serve many sequential runs, but
/// never two concurrent ones.
pub struct Engine {
    running: Arc<AtomicBool>,
    fees: FeeSchedule,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            fees: FeeSchedule::default(),
        }
    }

    pub fn with_fees(fees: FeeSchedule) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            fees,
        }
    }

    /// Observable run-active flag. False whenever no run is in flight.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Shared handle to the run-active flag, for observers on other
    /// threads.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Run one backtest to its terminal state.
    ///
    /// Interaction calls happen in a fixed order: the validator check at
    /// most once, then progress/log calls in simulated-timestamp order,
    /// then exactly one `on_finished` — always last, on every path.
    pub fn run(
        &mut self,
        config: &RunConfiguration,
        data: &MarketData,
        strategy: &mut dyn Strategy,
        interaction: &dyn RuntimeInteraction,
        cancel: &CancelToken,
    ) -> RunReport {
        let _guard = RunningGuard::engage(&self.running);
        let mut state = ExecutionState::new(config.init_capital);

        let end = self.drive_timeline(config, data, strategy, interaction, cancel, &mut state);

        let final_equity = state
            .daily_stats
            .last()
            .map(|s| s.total_asset)
            .unwrap_or(config.init_capital);
        let summary = RunSummary {
            terminal: end.terminal,
            trading_days: state.daily_stats.len(),
            trade_count: state.trades.len(),
            final_equity,
            error: state.terminal_error.clone(),
        };
        interaction.on_finished(&summary);

        RunReport {
            terminal: end.terminal,
            summary,
            snapshot: ExecutionSnapshot {
                trades: state.trades,
                daily_stats: state.daily_stats,
                error: state.terminal_error,
            },
            mismatch: end.mismatch,
        }
    }

    fn drive_timeline(
        &self,
        config: &RunConfiguration,
        data: &MarketData,
        strategy: &mut dyn Strategy,
        interaction: &dyn RuntimeInteraction,
        cancel: &CancelToken,
        state: &mut ExecutionState,
    ) -> TimelineEnd {
        match check_period_consistency(config, data, interaction) {
            ValidationOutcome::Aborted(details) => {
                let err = PeriodMismatchError {
                    details: details.clone(),
                };
                interaction.log(LogLevel::Error, &err.to_string());
                state.terminal_error = Some(err.to_string());
                return TimelineEnd {
                    terminal: TerminalState::Aborted,
                    mismatch: Some(details),
                };
            }
            ValidationOutcome::Continue => {}
        }

        let dates = data.calendar(&config.universe, config.start_date, config.end_date);
        interaction.log(
            LogLevel::Info,
            &format!(
                "starting backtest: {} symbols, {} trading days",
                config.universe.len(),
                dates.len()
            ),
        );

        let init_date = dates.first().copied().unwrap_or(config.start_date);
        if let Err(e) =
            self.call_hook(config, data, strategy, interaction, state, init_date, Hook::Init)
        {
            return self.fail(interaction, state, e);
        }

        let mut prev_total = config.init_capital;
        let mut last_percent: Option<u8> = None;
        let total_days = dates.len();

        for (index, date) in dates.iter().copied().enumerate() {
            if cancel.is_cancelled() {
                interaction.log(LogLevel::Warning, "run cancelled by external request");
                state.terminal_error = Some("cancelled by external request".to_string());
                return TimelineEnd {
                    terminal: TerminalState::Cancelled,
                    mismatch: None,
                };
            }
            state.current_date = Some(date);

            for hook in [Hook::PreMarket, Hook::Bar, Hook::PostMarket] {
                if let Err(e) =
                    self.call_hook(config, data, strategy, interaction, state, date, hook)
                {
                    return self.fail(interaction, state, e);
                }
            }

            let market_value = state.account.market_value(data, date);
            let total_asset = state.account.cash + market_value;
            let daily_return = if prev_total > 0.0 {
                (total_asset - prev_total) / prev_total
            } else {
                0.0
            };
            let benchmark_close = config
                .benchmark
                .as_deref()
                .and_then(|code| data.close(code, date));
            state.daily_stats.push(DailyStat {
                date,
                total_asset,
                cash: state.account.cash,
                market_value,
                daily_return,
                benchmark_close,
                positions: state.account.open_position_count(),
            });
            prev_total = total_asset;

            let percent = (((index + 1) * 100) / total_days) as u8;
            if last_percent != Some(percent) {
                interaction.report_progress(percent);
                last_percent = Some(percent);
            }
        }

        interaction.log(LogLevel::Info, "backtest completed");
        TimelineEnd {
            terminal: TerminalState::Completed,
            mismatch: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn call_hook(
        &self,
        config: &RunConfiguration,
        data: &MarketData,
        strategy: &mut dyn Strategy,
        interaction: &dyn RuntimeInteraction,
        state: &mut ExecutionState,
        date: NaiveDate,
        hook: Hook,
    ) -> Result<(), StrategyError> {
        let mut ctx = StrategyContext::new(
            date,
            data,
            &config.universe,
            &mut state.account,
            &self.fees,
            config.min_volume,
            &mut state.trades,
        );
        let result = match hook {
            Hook::Init => strategy.init(&mut ctx),
            Hook::PreMarket => strategy.on_pre_market(&mut ctx),
            Hook::Bar => strategy.on_bar(&mut ctx),
            Hook::PostMarket => strategy.on_post_market(&mut ctx),
        };
        let notes = ctx.take_notes();
        for note in notes {
            interaction.log(LogLevel::Warning, &note);
        }
        result
    }

    fn fail(
        &self,
        interaction: &dyn RuntimeInteraction,
        state: &mut ExecutionState,
        error: StrategyError,
    ) -> TimelineEnd {
        let message = match state.current_date {
            Some(date) => format!("strategy callback failed on {date}: {error}"),
            None => format!("strategy callback failed during init: {error}"),
        };
        interaction.log(LogLevel::Error, &message);
        state.terminal_error = Some(message);
        TimelineEnd {
            terminal: TerminalState::Failed,
            mismatch: None,
        }
    }
}

#[derive(Clone, Copy)]
enum Hook {
    Init,
    PreMarket,
    Bar,
    PostMarket,
}
