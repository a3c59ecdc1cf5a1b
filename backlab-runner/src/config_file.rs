//! JSON configuration document loading.
//!
//! The on-disk schema is an existing JSON-compatible document; this module
//! does not change it. Two options are recognized on top of the historical
//! set: `allow_period_mismatch` (default false) and `init_data_enabled`
//! (default: the previous implicit behavior, enabled).

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use backlab_core::{ConfigError, KlinePeriod, RunConfiguration, TriggerType};

#[derive(Debug, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    strategy_file: String,
    #[serde(default)]
    stock_list: Vec<String>,
    #[serde(default)]
    data: DataSection,
    backtest: BacktestSection,
    /// Free-form settings served by the headless `read_setting` capability.
    #[serde(default)]
    settings: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct DataSection {
    #[serde(default = "default_period")]
    kline_period: String,
    #[serde(default = "default_dividend")]
    dividend_type: String,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            kline_period: default_period(),
            dividend_type: default_dividend(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BacktestSection {
    start: NaiveDate,
    end: NaiveDate,
    #[serde(default = "default_capital")]
    init_capital: f64,
    #[serde(default)]
    benchmark: Option<String>,
    #[serde(default)]
    trigger: TriggerSection,
    #[serde(default = "default_min_volume")]
    min_volume: i64,
    #[serde(default)]
    allow_period_mismatch: bool,
    #[serde(default)]
    init_data_enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct TriggerSection {
    #[serde(rename = "type", default = "default_period")]
    trigger_type: String,
}

impl Default for TriggerSection {
    fn default() -> Self {
        Self {
            trigger_type: default_period(),
        }
    }
}

fn default_period() -> String {
    "tick".to_string()
}

fn default_dividend() -> String {
    "none".to_string()
}

fn default_capital() -> f64 {
    100_000.0
}

fn default_min_volume() -> i64 {
    100
}

/// Normalize legacy lowercase-prefix benchmark codes ("sh.000300") to the
/// suffix style the data layer uses ("000300.SH").
pub fn normalize_benchmark(code: &str) -> String {
    match code.split_once('.') {
        Some((prefix, body)) if prefix.eq_ignore_ascii_case("sh") || prefix.eq_ignore_ascii_case("sz") => {
            format!("{}.{}", body, prefix.to_ascii_uppercase())
        }
        _ => code.to_string(),
    }
}

/// Load and validate a run configuration from a JSON document on disk.
pub fn load_config(path: &Path) -> Result<RunConfiguration, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::Missing(path.display().to_string()));
    }
    let text = std::fs::read_to_string(path)?;
    parse_config(&text)
}

/// Parse a run configuration from JSON text.
pub fn parse_config(text: &str) -> Result<RunConfiguration, ConfigError> {
    let doc: ConfigDocument = serde_json::from_str(text)?;

    let kline_period: KlinePeriod = doc.data.kline_period.parse()?;
    let trigger: TriggerType = doc.backtest.trigger.trigger_type.parse()?;

    let config = RunConfiguration {
        universe: doc.stock_list,
        start_date: doc.backtest.start,
        end_date: doc.backtest.end,
        kline_period,
        trigger,
        init_capital: doc.backtest.init_capital,
        benchmark: doc
            .backtest
            .benchmark
            .as_deref()
            .map(normalize_benchmark),
        strategy_ref: doc.strategy_file,
        min_volume: doc.backtest.min_volume,
        dividend_type: doc.data.dividend_type,
        allow_period_mismatch: doc.backtest.allow_period_mismatch,
        init_data_enabled: doc.backtest.init_data_enabled,
        defaults: doc.settings,
    };
    config.validate()?;
    Ok(config)
}
