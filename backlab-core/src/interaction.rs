//! Runtime interaction boundary — the seam between the execution core and
//! whatever front end (if any) is driving a run.
//!
//! The engine only ever talks to `dyn RuntimeInteraction`; it never learns
//! which variant is bound. Variant selection happens once, at
//! run-construction time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::PeriodMismatchPolicy;
use crate::domain::RunSummary;
use crate::validator::PeriodMismatch;

/// Severity attached to boundary log calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

/// Capability set the execution core consumes during a run.
///
/// Exactly one instance is bound per run; its lifetime is the run's
/// lifetime and the caller owns it.
pub trait RuntimeInteraction {
    fn log(&self, level: LogLevel, message: &str);

    /// Progress in whole percent. Called at a bounded cadence, not per step.
    fn report_progress(&self, percent: u8);

    /// Resolve a detected period mismatch: `true` continues the run,
    /// `false` aborts it. Headless implementations must answer from policy
    /// without blocking; interactive ones may block pending a user decision.
    fn confirm_period_mismatch(&self, details: &PeriodMismatch) -> bool;

    /// Invoked exactly once per run, after the last timeline step, whatever
    /// the terminal state.
    fn on_finished(&self, summary: &RunSummary);

    /// Present a finished run's output directory.
    fn open_result(&self, output_dir: &Path);

    fn read_setting(&self, key: &str) -> Option<String>;

    fn write_setting(&self, key: &str, value: &str);
}

/// Headless variant: auto-resolves every capability, never blocks.
pub struct HeadlessInteraction {
    policy: PeriodMismatchPolicy,
    defaults: BTreeMap<String, String>,
    overrides: Mutex<BTreeMap<String, String>>,
    summary: Mutex<Option<RunSummary>>,
    last_result_dir: Mutex<Option<PathBuf>>,
}

impl HeadlessInteraction {
    pub fn new(policy: PeriodMismatchPolicy, defaults: BTreeMap<String, String>) -> Self {
        Self {
            policy,
            defaults,
            overrides: Mutex::new(BTreeMap::new()),
            summary: Mutex::new(None),
            last_result_dir: Mutex::new(None),
        }
    }

    /// Summary stored by `on_finished`, for the caller to retrieve.
    pub fn take_summary(&self) -> Option<RunSummary> {
        self.summary.lock().expect("summary lock poisoned").take()
    }

    /// Output directory recorded by `open_result`, if any.
    pub fn last_result_dir(&self) -> Option<PathBuf> {
        self.last_result_dir
            .lock()
            .expect("result dir lock poisoned")
            .clone()
    }
}

impl RuntimeInteraction for HeadlessInteraction {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!("{message}"),
            LogLevel::Info => tracing::info!("{message}"),
            LogLevel::Warning => tracing::warn!("{message}"),
            LogLevel::Error => tracing::error!("{message}"),
        }
    }

    fn report_progress(&self, _percent: u8) {}

    fn confirm_period_mismatch(&self, _details: &PeriodMismatch) -> bool {
        // Decision derives purely from policy; no user input exists here.
        matches!(self.policy, PeriodMismatchPolicy::AllowWithWarning)
    }

    fn on_finished(&self, summary: &RunSummary) {
        *self.summary.lock().expect("summary lock poisoned") = Some(summary.clone());
    }

    fn open_result(&self, output_dir: &Path) {
        *self
            .last_result_dir
            .lock()
            .expect("result dir lock poisoned") = Some(output_dir.to_path_buf());
        tracing::info!("backtest output directory: {}", output_dir.display());
    }

    fn read_setting(&self, key: &str) -> Option<String> {
        let overrides = self.overrides.lock().expect("settings lock poisoned");
        overrides
            .get(key)
            .or_else(|| self.defaults.get(key))
            .cloned()
    }

    fn write_setting(&self, key: &str, value: &str) {
        self.overrides
            .lock()
            .expect("settings lock poisoned")
            .insert(key.to_string(), value.to_string());
    }
}

/// Test double that records every boundary call in order.
///
/// Lives in the library (not behind `cfg(test)`) so downstream crates can
/// assert on interaction ordering in their own suites.
#[derive(Default)]
pub struct RecordingInteraction {
    calls: Mutex<Vec<InteractionCall>>,
    confirm_answer: bool,
}

/// One recorded boundary call.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionCall {
    Log { level: &'static str, message: String },
    Progress(u8),
    Confirm(String),
    Finished(RunSummaryCall),
    OpenResult(PathBuf),
}

/// Comparable subset of a recorded `RunSummary`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummaryCall {
    pub terminal: crate::domain::TerminalState,
    pub trade_count: usize,
    pub trading_days: usize,
}

impl RecordingInteraction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every `confirm_period_mismatch` with the given decision.
    pub fn answering(confirm_answer: bool) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            confirm_answer,
        }
    }

    pub fn calls(&self) -> Vec<InteractionCall> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    pub fn finished_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, InteractionCall::Finished(_)))
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, InteractionCall::Log { level: "WARNING", .. }))
            .count()
    }

    fn push(&self, call: InteractionCall) {
        self.calls.lock().expect("calls lock poisoned").push(call);
    }
}

impl RuntimeInteraction for RecordingInteraction {
    fn log(&self, level: LogLevel, message: &str) {
        self.push(InteractionCall::Log {
            level: level.as_str(),
            message: message.to_string(),
        });
    }

    fn report_progress(&self, percent: u8) {
        self.push(InteractionCall::Progress(percent));
    }

    fn confirm_period_mismatch(&self, details: &PeriodMismatch) -> bool {
        self.push(InteractionCall::Confirm(details.to_string()));
        self.confirm_answer
    }

    fn on_finished(&self, summary: &RunSummary) {
        self.push(InteractionCall::Finished(RunSummaryCall {
            terminal: summary.terminal,
            trade_count: summary.trade_count,
            trading_days: summary.trading_days,
        }));
    }

    fn open_result(&self, output_dir: &Path) {
        self.push(InteractionCall::OpenResult(output_dir.to_path_buf()));
    }

    fn read_setting(&self, _key: &str) -> Option<String> {
        None
    }

    fn write_setting(&self, _key: &str, _value: &str) {}
}
