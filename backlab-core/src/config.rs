//! Validated per-run configuration.
//!
//! A `RunConfiguration` is immutable once a run starts. The runner crate
//! builds it from the JSON configuration document; tests build it directly.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bar frequency of the configured data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KlinePeriod {
    Tick,
    #[serde(rename = "1m")]
    Min1,
    #[serde(rename = "5m")]
    Min5,
    #[serde(rename = "1d")]
    Day1,
}

impl KlinePeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            KlinePeriod::Tick => "tick",
            KlinePeriod::Min1 => "1m",
            KlinePeriod::Min5 => "5m",
            KlinePeriod::Day1 => "1d",
        }
    }
}

impl std::str::FromStr for KlinePeriod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tick" => Ok(KlinePeriod::Tick),
            "1m" => Ok(KlinePeriod::Min1),
            "5m" => Ok(KlinePeriod::Min5),
            "1d" => Ok(KlinePeriod::Day1),
            other => Err(ConfigError::UnknownPeriod(other.to_string())),
        }
    }
}

impl std::fmt::Display for KlinePeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What drives the strategy callbacks during the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    Tick,
    #[serde(rename = "1m")]
    Min1,
    #[serde(rename = "5m")]
    Min5,
    #[serde(rename = "1d")]
    Day1,
    /// Caller-defined trigger points; period consistency is not checked.
    Custom,
}

impl TriggerType {
    /// Data period a trigger expects, or `None` for custom triggers.
    pub fn expected_period(&self) -> Option<KlinePeriod> {
        match self {
            TriggerType::Tick => Some(KlinePeriod::Tick),
            TriggerType::Min1 => Some(KlinePeriod::Min1),
            TriggerType::Min5 => Some(KlinePeriod::Min5),
            TriggerType::Day1 => Some(KlinePeriod::Day1),
            TriggerType::Custom => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::Tick => "tick",
            TriggerType::Min1 => "1m",
            TriggerType::Min5 => "5m",
            TriggerType::Day1 => "1d",
            TriggerType::Custom => "custom",
        }
    }
}

impl std::str::FromStr for TriggerType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tick" => Ok(TriggerType::Tick),
            "1m" => Ok(TriggerType::Min1),
            "5m" => Ok(TriggerType::Min5),
            "1d" => Ok(TriggerType::Day1),
            "custom" => Ok(TriggerType::Custom),
            other => Err(ConfigError::UnknownTrigger(other.to_string())),
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a headless run resolves a detected period mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodMismatchPolicy {
    /// Abort with a typed mismatch error (default).
    FailFast,
    /// Log one warning through the interaction boundary and continue.
    AllowWithWarning,
}

/// Errors from configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown kline period '{0}'")]
    UnknownPeriod(String),
    #[error("unknown trigger type '{0}'")]
    UnknownTrigger(String),
    #[error("stock list is empty")]
    EmptyUniverse,
    #[error("backtest end date {end} precedes start date {start}")]
    InvertedDateRange { start: NaiveDate, end: NaiveDate },
    #[error("config file not found: {0}")]
    Missing(String),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Immutable input describing one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfiguration {
    pub universe: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub kline_period: KlinePeriod,
    pub trigger: TriggerType,
    pub init_capital: f64,
    pub benchmark: Option<String>,
    /// Strategy reference resolved through the registry.
    pub strategy_ref: String,
    pub min_volume: i64,
    pub dividend_type: String,
    /// Continue with a warning instead of failing fast on period mismatch.
    pub allow_period_mismatch: bool,
    /// `None` keeps the historical implicit behavior (enabled).
    pub init_data_enabled: Option<bool>,
    /// Configuration-supplied settings served by the headless
    /// `read_setting` capability.
    pub defaults: BTreeMap<String, String>,
}

impl RunConfiguration {
    /// Policy resolved once per run from `allow_period_mismatch`.
    pub fn mismatch_policy(&self) -> PeriodMismatchPolicy {
        if self.allow_period_mismatch {
            PeriodMismatchPolicy::AllowWithWarning
        } else {
            PeriodMismatchPolicy::FailFast
        }
    }

    /// Effective data-initialization switch (`None` means enabled).
    pub fn init_data(&self) -> bool {
        self.init_data_enabled.unwrap_or(true)
    }

    /// Validate cross-field invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.universe.is_empty() {
            return Err(ConfigError::EmptyUniverse);
        }
        if self.end_date < self.start_date {
            return Err(ConfigError::InvertedDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        Ok(())
    }
}
