//! Period-consistency validation.
//!
//! Runs exactly once, before the simulated timeline begins. Compares the
//! period the loaded data actually carries against the period the trigger
//! type expects and decides whether the run continues.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{KlinePeriod, PeriodMismatchPolicy, RunConfiguration, TriggerType};
use crate::interaction::{LogLevel, RuntimeInteraction};
use crate::market::MarketData;

/// Details of a detected disagreement between data period and trigger type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodMismatch {
    pub data_period: KlinePeriod,
    pub trigger: TriggerType,
    pub expected: KlinePeriod,
}

impl std::fmt::Display for PeriodMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "data period {} does not match trigger type {} (expected {})",
            self.data_period, self.trigger, self.expected
        )
    }
}

/// Typed error surfaced by headless fail-fast aborts.
#[derive(Debug, Clone, Error)]
#[error("period mismatch: {details}; set allow_period_mismatch to continue")]
pub struct PeriodMismatchError {
    pub details: PeriodMismatch,
}

/// Outcome of the single pre-timeline check.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Continue,
    Aborted(PeriodMismatch),
}

/// Pure comparison: the mismatch between configuration/data and trigger, if
/// any. `Custom` triggers are exempt.
pub fn detect_mismatch(
    data_period: KlinePeriod,
    trigger: TriggerType,
) -> Option<PeriodMismatch> {
    let expected = trigger.expected_period()?;
    if data_period == expected {
        return None;
    }
    Some(PeriodMismatch {
        data_period,
        trigger,
        expected,
    })
}

/// Run the consistency check once for this run.
///
/// On mismatch, a permissive policy logs exactly one warning and continues;
/// otherwise the decision is delegated to `confirm_period_mismatch`, which
/// headless variants answer from policy and interactive variants put to the
/// user. Idempotent for identical inputs; never retried.
pub fn check_period_consistency(
    config: &RunConfiguration,
    data: &MarketData,
    interaction: &dyn RuntimeInteraction,
) -> ValidationOutcome {
    let data_period = data.effective_period(config.kline_period);
    let Some(details) = detect_mismatch(data_period, config.trigger) else {
        return ValidationOutcome::Continue;
    };

    if config.mismatch_policy() == PeriodMismatchPolicy::AllowWithWarning {
        interaction.log(
            LogLevel::Warning,
            &format!("period mismatch allowed: {details}"),
        );
        return ValidationOutcome::Continue;
    }

    if interaction.confirm_period_mismatch(&details) {
        interaction.log(
            LogLevel::Warning,
            &format!("continuing despite period mismatch: {details}"),
        );
        ValidationOutcome::Continue
    } else {
        ValidationOutcome::Aborted(details)
    }
}
