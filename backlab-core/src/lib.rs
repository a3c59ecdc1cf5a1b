//! backlab-core — the dual-mode backtest engine.
//!
//! The engine runs identically whether an interactive front end or a
//! headless caller drives it: everything observable flows through the
//! `RuntimeInteraction` boundary, selected once at run construction.
//! This crate holds the domain types, the frozen strategy callback
//! contract, the period-consistency validator, and the execution core.
//! It knows nothing about artifacts, configuration files, or UI toolkits.

pub mod config;
pub mod domain;
pub mod engine;
pub mod interaction;
pub mod market;
pub mod strategy;
pub mod validator;

pub use config::{ConfigError, KlinePeriod, PeriodMismatchPolicy, RunConfiguration, TriggerType};
pub use domain::{
    Bar, DailyStat, FeeSchedule, RunSummary, TerminalState, TradeAction, TradeRecord,
};
pub use engine::{CancelToken, Engine, ExecutionSnapshot, RunReport};
pub use interaction::{HeadlessInteraction, LogLevel, RecordingInteraction, RuntimeInteraction};
pub use market::MarketData;
pub use strategy::{Account, Position, Strategy, StrategyContext, StrategyError};
pub use validator::{
    check_period_consistency, detect_mismatch, PeriodMismatch, PeriodMismatchError,
    ValidationOutcome,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn cancel_token_is_send_sync() {
        assert_send::<CancelToken>();
        assert_sync::<CancelToken>();
    }

    #[test]
    fn run_summary_is_send_sync() {
        assert_send::<RunSummary>();
        assert_sync::<RunSummary>();
    }

    #[test]
    fn snapshot_is_send_sync() {
        assert_send::<ExecutionSnapshot>();
        assert_sync::<ExecutionSnapshot>();
    }

    #[test]
    fn config_is_send_sync() {
        assert_send::<RunConfiguration>();
        assert_sync::<RunConfiguration>();
    }
}
