//! End-to-end tests for the headless API: the five-file contract, the
//! period-mismatch policy, and containment of strategy failures.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use tempfile::TempDir;

use backlab_core::{
    Bar, KlinePeriod, MarketData, RunConfiguration, Strategy, StrategyContext, StrategyError,
    TerminalState, TriggerType,
};
use backlab_runner::{
    parse_backtest_dir, run_backtest, run_backtest_with, ApiError, RunOptions, REQUIRED_FILES,
};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn five_day_data() -> MarketData {
    let mut data = MarketData::new();
    let series: Vec<Bar> = (2..7)
        .map(|d| Bar {
            date: day(d),
            open: 10.0,
            high: 10.5,
            low: 9.5,
            close: 10.0 + d as f64 * 0.05,
            volume: 100_000,
        })
        .collect();
    data.insert_series("000001.SZ", series.clone());
    data.insert_series("000300.SH", series);
    data.with_native_period(KlinePeriod::Day1)
}

fn config() -> RunConfiguration {
    RunConfiguration {
        universe: vec!["000001.SZ".into()],
        start_date: day(2),
        end_date: day(6),
        kline_period: KlinePeriod::Day1,
        trigger: TriggerType::Day1,
        init_capital: 100_000.0,
        benchmark: Some("000300.SH".into()),
        strategy_ref: "scenario".into(),
        min_volume: 100,
        dividend_type: "none".into(),
        allow_period_mismatch: false,
        init_data_enabled: None,
        defaults: BTreeMap::new(),
    }
}

/// Produces exactly three trades over the run: buys on the first three
/// days, holds afterwards.
struct ThreeTrades {
    days_seen: usize,
}

impl Strategy for ThreeTrades {
    fn init(&mut self, _ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        Ok(())
    }

    fn on_bar(&mut self, ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        self.days_seen += 1;
        if self.days_seen <= 3 {
            assert!(ctx.buy("000001.SZ", 100));
        }
        Ok(())
    }
}

struct NoOp;

impl Strategy for NoOp {
    fn init(&mut self, _ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        Ok(())
    }

    fn on_bar(&mut self, _ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        Ok(())
    }
}

struct FailsOnThirdDay {
    days_seen: usize,
}

impl Strategy for FailsOnThirdDay {
    fn init(&mut self, _ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        Ok(())
    }

    fn on_bar(&mut self, _ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        self.days_seen += 1;
        if self.days_seen == 3 {
            return Err(StrategyError("bad bar".into()));
        }
        Ok(())
    }
}

fn assert_contract_files(dir: &Path) {
    for name in REQUIRED_FILES {
        assert!(dir.join(name).is_file(), "{name} must exist in {dir:?}");
    }
    let benchmark = std::fs::read_to_string(dir.join("benchmark.csv")).unwrap();
    assert!(
        benchmark.starts_with("date,close"),
        "benchmark.csv must begin with its fixed header"
    );
}

// Scenario A: consistent period, 3 trades over 5 days.
#[test]
fn consistent_run_produces_expected_artifact_shape() {
    let results = TempDir::new().unwrap();
    let result = run_backtest_with(
        &config(),
        &five_day_data(),
        &mut ThreeTrades { days_seen: 0 },
        results.path(),
    )
    .unwrap();

    assert_eq!(result.terminal_state, TerminalState::Completed);
    assert_contract_files(&result.output_dir);
    assert_eq!(result.trades.row_count(), 3);
    assert_eq!(result.daily_stats.row_count(), 5);
    assert_eq!(result.summary.row_count(), 1);
    assert_eq!(result.benchmark.row_count(), 5);
    assert!(result.error_summary.is_none());
}

// Scenario B: mismatched period, default flags, headless.
#[test]
fn mismatch_fails_fast_without_artifacts() {
    let mut cfg = config();
    cfg.trigger = TriggerType::Min5;
    let results = TempDir::new().unwrap();

    let err = run_backtest_with(&cfg, &five_day_data(), &mut NoOp, results.path()).unwrap_err();
    assert!(matches!(err, ApiError::PeriodMismatch(_)));

    // No run directory may appear under the results root.
    let entries: Vec<_> = std::fs::read_dir(results.path()).unwrap().collect();
    assert!(entries.is_empty(), "no artifacts may be written on abort");
}

// Scenario C: same mismatch with the override set.
#[test]
fn mismatch_override_continues_and_writes_artifacts() {
    let mut cfg = config();
    cfg.trigger = TriggerType::Min5;
    cfg.allow_period_mismatch = true;
    let results = TempDir::new().unwrap();

    let result =
        run_backtest_with(&cfg, &five_day_data(), &mut NoOp, results.path()).unwrap();

    assert_eq!(result.terminal_state, TerminalState::Completed);
    assert_contract_files(&result.output_dir);
    assert_eq!(result.trades.row_count(), 0);
    assert_eq!(result.daily_stats.row_count(), 5);
}

// Scenario D: per-bar hook fails on day 3 of 5.
#[test]
fn strategy_failure_is_contained_with_partial_artifacts() {
    let results = TempDir::new().unwrap();
    let result = run_backtest_with(
        &config(),
        &five_day_data(),
        &mut FailsOnThirdDay { days_seen: 0 },
        results.path(),
    )
    .unwrap();

    assert_eq!(result.terminal_state, TerminalState::Failed);
    assert!(result.error_summary.as_deref().unwrap().contains("bad bar"));
    assert_contract_files(&result.output_dir);
    // Only the first two days completed.
    assert_eq!(result.daily_stats.row_count(), 2);
    // The summary row still exists with whatever could be computed.
    assert_eq!(result.summary.row_count(), 1);
}

#[test]
fn round_trip_counts_match_recorded_state() {
    let results = TempDir::new().unwrap();
    let result = run_backtest_with(
        &config(),
        &five_day_data(),
        &mut ThreeTrades { days_seen: 0 },
        results.path(),
    )
    .unwrap();

    let reparsed = parse_backtest_dir(&result.output_dir).unwrap();
    assert_eq!(reparsed.trades.row_count(), result.trades.row_count());
    assert_eq!(
        reparsed.daily_stats.row_count(),
        result.daily_stats.row_count()
    );
    assert_eq!(reparsed.metrics.trade_days, 5);
}

#[test]
fn missing_config_path_is_invalid_input() {
    let err = run_backtest(
        Path::new("/nonexistent/run.json"),
        "buy_and_hold",
        &RunOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}

#[test]
fn unresolvable_strategy_reference_is_invalid_input() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("run.json");
    std::fs::write(
        &config_path,
        r#"{
            "stock_list": ["000001.SZ"],
            "data": {"kline_period": "1d"},
            "backtest": {
                "start": "2024-01-02",
                "end": "2024-01-31",
                "trigger": {"type": "1d"}
            }
        }"#,
    )
    .unwrap();

    let err = run_backtest(&config_path, "no_such_strategy", &RunOptions::default()).unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}

#[test]
fn config_level_mismatch_fails_before_data_load() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("run.json");
    // 5m data against a 1d trigger; no cached data exists, so reaching the
    // data layer would produce a LoadError instead of the policy error.
    std::fs::write(
        &config_path,
        r#"{
            "stock_list": ["000001.SZ"],
            "data": {"kline_period": "5m"},
            "backtest": {
                "start": "2024-01-02",
                "end": "2024-01-31",
                "trigger": {"type": "1d"}
            }
        }"#,
    )
    .unwrap();

    let opts = RunOptions {
        data_dir: dir.path().join("data"),
        results_root: dir.path().join("results"),
        ..RunOptions::default()
    };
    let err = run_backtest(&config_path, "buy_and_hold", &opts).unwrap_err();
    assert!(matches!(err, ApiError::PeriodMismatch(_)));
}

#[test]
fn full_headless_run_with_synthetic_data() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("run.json");
    std::fs::write(
        &config_path,
        r#"{
            "strategy_file": "strategies/buy_and_hold.strat",
            "stock_list": ["000001.SZ"],
            "data": {"kline_period": "1d"},
            "backtest": {
                "start": "2024-01-02",
                "end": "2024-03-29",
                "benchmark": "sh.000300",
                "trigger": {"type": "1d"}
            }
        }"#,
    )
    .unwrap();

    let opts = RunOptions {
        data_dir: dir.path().join("data"),
        results_root: dir.path().join("results"),
        synthetic_data: true,
        ..RunOptions::default()
    };
    let result = run_backtest(&config_path, "", &opts).unwrap();

    assert_eq!(result.terminal_state, TerminalState::Completed);
    assert_contract_files(&result.output_dir);
    assert!(result.daily_stats.row_count() > 0);
    assert!(result.metrics.trade_days > 0);
    // Benchmark was normalized and loaded through the same cache.
    assert!(result.benchmark.row_count() > 0);
}
