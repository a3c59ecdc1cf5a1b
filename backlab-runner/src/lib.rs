//! backlab-runner — backtest orchestration over `backlab-core`.
//!
//! This crate provides:
//! - JSON configuration document loading
//! - CSV bar cache with an optional synthetic provider
//! - The artifact writer (fixed five-file output contract)
//! - The result parser and the headless API facade `run_backtest`
//!
//! It never links UI code: headless execution works in environments with
//! no display or UI runtime.

pub mod api;
pub mod artifacts;
pub mod config_file;
pub mod data;
pub mod result;
pub mod strategies;

pub use api::{
    execute_run, precheck_period_policy, run_backtest, run_backtest_with, ApiError, ExecutedRun,
    RunOptions,
};
pub use artifacts::{
    compute_summary, format_runtime, write_artifact_set, ArtifactPaths, RunRecord, RunTiming,
    SummaryRow,
};
pub use config_file::{load_config, normalize_benchmark, parse_config};
pub use data::{
    load_market_data, BarProvider, CsvBarCache, LoadError, LoadOptions, SyntheticProvider,
};
pub use result::{parse_backtest_dir, BacktestResult, ParseError, SummaryMetrics, Table, REQUIRED_FILES};
pub use strategies::{known_strategies, resolve, BuyAndHold, MaCrossover, RegistryError};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn backtest_result_is_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
    }

    #[test]
    fn run_options_is_send_sync() {
        assert_send::<RunOptions>();
        assert_sync::<RunOptions>();
    }

    #[test]
    fn load_types_are_send_sync() {
        assert_send::<LoadOptions>();
        assert_sync::<LoadOptions>();
        assert_send::<CsvBarCache>();
        assert_sync::<CsvBarCache>();
    }
}
