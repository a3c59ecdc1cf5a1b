//! Channel-based runtime interaction for interactive front ends.
//!
//! The worker thread never touches UI state directly: every interaction
//! call becomes a `UiEvent` on an mpsc channel that the front end's event
//! loop drains on its own thread. The one blocking call is the period
//! mismatch confirmation, which carries a reply channel and parks the
//! worker until the front end answers.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Sender};

use backlab_core::{
    LogLevel, PeriodMismatch, RunSummary, RuntimeInteraction,
};
use backlab_runner::BacktestResult;

use crate::settings::SettingsStore;

/// Events delivered to the front end's event loop.
#[derive(Debug)]
pub enum UiEvent {
    Log {
        level: LogLevel,
        message: String,
    },
    Progress(u8),
    /// Period mismatch needs a user decision. Send `true` on `reply` to
    /// continue the run, `false` to abort it.
    ConfirmPeriodMismatch {
        details: PeriodMismatch,
        reply: Sender<bool>,
    },
    /// The run reached a terminal state. Always delivered exactly once per
    /// run, after the last progress/log event.
    Finished(RunSummary),
    /// Artifacts are on disk; show the result view.
    OpenResult(PathBuf),
    /// Parsed result of a run that produced artifacts.
    RunComplete(Box<BacktestResult>),
    /// The run could not be started or orchestrated.
    RunError(String),
}

/// `RuntimeInteraction` bound to a front end through a channel.
pub struct FrontendInteraction {
    tx: Sender<UiEvent>,
    settings: SettingsStore,
}

impl FrontendInteraction {
    pub fn new(tx: Sender<UiEvent>, settings: SettingsStore) -> Self {
        Self { tx, settings }
    }
}

impl RuntimeInteraction for FrontendInteraction {
    fn log(&self, level: LogLevel, message: &str) {
        let _ = self.tx.send(UiEvent::Log {
            level,
            message: message.to_string(),
        });
    }

    fn report_progress(&self, percent: u8) {
        let _ = self.tx.send(UiEvent::Progress(percent));
    }

    fn confirm_period_mismatch(&self, details: &PeriodMismatch) -> bool {
        let (reply_tx, reply_rx) = channel();
        let sent = self.tx.send(UiEvent::ConfirmPeriodMismatch {
            details: details.clone(),
            reply: reply_tx,
        });
        if sent.is_err() {
            tracing::warn!("front end gone before mismatch confirmation; continuing");
            return true;
        }
        match reply_rx.recv() {
            Ok(decision) => decision,
            Err(_) => {
                // Front end dropped the reply channel without answering.
                tracing::warn!("mismatch confirmation went unanswered; continuing");
                true
            }
        }
    }

    fn on_finished(&self, summary: &RunSummary) {
        let _ = self.tx.send(UiEvent::Finished(summary.clone()));
    }

    fn open_result(&self, output_dir: &Path) {
        let _ = self
            .tx
            .send(UiEvent::OpenResult(output_dir.to_path_buf()));
    }

    fn read_setting(&self, key: &str) -> Option<String> {
        self.settings.get(key)
    }

    fn write_setting(&self, key: &str, value: &str) {
        self.settings.set(key, value);
    }
}
