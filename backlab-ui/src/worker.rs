//! Background worker thread — engine runs happen here, never on the
//! front end's event loop.
//!
//! Communication is one mpsc channel each way: commands in, `UiEvent`s
//! out. The worker binds a `FrontendInteraction` to each run, so every
//! observable step of the engine reaches the front end as an event.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use backlab_core::{CancelToken, RunConfiguration, TerminalState};
use backlab_runner::{
    execute_run, load_market_data, parse_backtest_dir, strategies, BarProvider, CsvBarCache,
    LoadOptions, SyntheticProvider,
};

use crate::events::{FrontendInteraction, UiEvent};
use crate::settings::SettingsStore;

/// Commands sent from the front end to the worker.
#[derive(Debug)]
pub enum WorkerCommand {
    RunBacktest {
        config: RunConfiguration,
        data_dir: PathBuf,
        results_root: PathBuf,
        /// Fill cache misses from the synthetic provider.
        synthetic_data: bool,
    },
    Shutdown,
}

/// Spawn the background worker thread.
pub fn spawn_worker(
    rx: Receiver<WorkerCommand>,
    tx: Sender<UiEvent>,
    settings: SettingsStore,
    cancel: CancelToken,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("backlab-worker".into())
        .spawn(move || worker_loop(rx, tx, settings, cancel))
        .expect("failed to spawn worker thread")
}

fn worker_loop(
    rx: Receiver<WorkerCommand>,
    tx: Sender<UiEvent>,
    settings: SettingsStore,
    cancel: CancelToken,
) {
    loop {
        match rx.recv() {
            Ok(WorkerCommand::Shutdown) | Err(_) => break,
            Ok(WorkerCommand::RunBacktest {
                config,
                data_dir,
                results_root,
                synthetic_data,
            }) => {
                cancel.reset();
                handle_run(
                    &config,
                    &data_dir,
                    &results_root,
                    synthetic_data,
                    &tx,
                    &settings,
                    &cancel,
                );
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_run(
    config: &RunConfiguration,
    data_dir: &Path,
    results_root: &Path,
    synthetic_data: bool,
    tx: &Sender<UiEvent>,
    settings: &SettingsStore,
    cancel: &CancelToken,
) {
    let mut strategy = match strategies::resolve(&config.strategy_ref) {
        Ok(strategy) => strategy,
        Err(e) => {
            let _ = tx.send(UiEvent::RunError(e.to_string()));
            return;
        }
    };

    let cache = CsvBarCache::new(data_dir);
    let synthetic = SyntheticProvider::default();
    let provider: Option<&dyn BarProvider> = if synthetic_data {
        Some(&synthetic)
    } else {
        None
    };
    let load_opts = LoadOptions {
        start: config.start_date,
        end: config.end_date,
        init_data: config.init_data(),
    };
    let data = match load_market_data(
        &config.universe,
        config.benchmark.as_deref(),
        &cache,
        provider,
        &load_opts,
    ) {
        Ok(data) => data,
        Err(e) => {
            let _ = tx.send(UiEvent::RunError(e.to_string()));
            return;
        }
    };

    let interaction = FrontendInteraction::new(tx.clone(), settings.clone());
    match execute_run(
        config,
        &data,
        strategy.as_mut(),
        &interaction,
        results_root,
        cancel,
    ) {
        Ok(executed) => {
            // An aborted run already delivered its Finished event; there is
            // no artifact set to parse.
            if executed.report.terminal == TerminalState::Aborted {
                return;
            }
            let Some(output_dir) = executed.output_dir else {
                let _ = tx.send(UiEvent::RunError(
                    "run finished without an output directory".to_string(),
                ));
                return;
            };
            match parse_backtest_dir(&output_dir) {
                Ok(mut result) => {
                    result.terminal_state = executed.report.terminal;
                    result.error_summary = executed.report.summary.error.clone();
                    let _ = tx.send(UiEvent::RunComplete(Box::new(result)));
                }
                Err(e) => {
                    let _ = tx.send(UiEvent::RunError(e.to_string()));
                }
            }
        }
        Err(e) => {
            let _ = tx.send(UiEvent::RunError(e.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backlab_core::{KlinePeriod, RunSummary, TriggerType};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::sync::mpsc::channel;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn config(trigger: TriggerType) -> RunConfiguration {
        RunConfiguration {
            universe: vec!["000001.SZ".into()],
            start_date: day(2),
            end_date: day(31),
            kline_period: KlinePeriod::Day1,
            trigger,
            init_capital: 100_000.0,
            benchmark: None,
            strategy_ref: "buy_and_hold".into(),
            min_volume: 100,
            dividend_type: "none".into(),
            allow_period_mismatch: false,
            init_data_enabled: None,
            defaults: BTreeMap::new(),
        }
    }

    fn run_command(trigger: TriggerType, dir: &tempfile::TempDir) -> WorkerCommand {
        WorkerCommand::RunBacktest {
            config: config(trigger),
            data_dir: dir.path().join("data"),
            results_root: dir.path().join("results"),
            synthetic_data: true,
        }
    }

    /// Drain events like a front-end loop, answering confirmations with
    /// `decision`, until the run's Finished event arrives.
    fn drain_until_finished(rx: &Receiver<UiEvent>, decision: bool) -> (RunSummary, Vec<UiEvent>) {
        let mut seen = Vec::new();
        loop {
            let event = rx.recv().expect("worker hung up before Finished");
            match event {
                UiEvent::ConfirmPeriodMismatch { reply, .. } => {
                    reply.send(decision).unwrap();
                }
                UiEvent::Finished(summary) => return (summary, seen),
                other => seen.push(other),
            }
        }
    }

    #[test]
    fn worker_shutdown_joins_cleanly() {
        let (cmd_tx, cmd_rx) = channel();
        let (event_tx, _event_rx) = channel();
        let handle = spawn_worker(
            cmd_rx,
            event_tx,
            SettingsStore::in_memory(),
            CancelToken::new(),
        );

        cmd_tx.send(WorkerCommand::Shutdown).unwrap();
        handle.join().expect("worker should join cleanly");
    }

    #[test]
    fn completed_run_delivers_finished_then_result() {
        let dir = tempfile::TempDir::new().unwrap();
        let (cmd_tx, cmd_rx) = channel();
        let (event_tx, event_rx) = channel();
        let handle = spawn_worker(
            cmd_rx,
            event_tx,
            SettingsStore::in_memory(),
            CancelToken::new(),
        );

        cmd_tx.send(run_command(TriggerType::Day1, &dir)).unwrap();
        let (summary, _) = drain_until_finished(&event_rx, true);
        assert_eq!(summary.terminal, TerminalState::Completed);
        assert!(summary.trading_days > 0);

        // After Finished: OpenResult then RunComplete.
        let mut saw_open = false;
        let mut saw_complete = false;
        while !(saw_open && saw_complete) {
            match event_rx.recv().expect("expected post-run events") {
                UiEvent::OpenResult(path) => {
                    assert!(path.join("trades.csv").is_file());
                    saw_open = true;
                }
                UiEvent::RunComplete(result) => {
                    assert_eq!(result.terminal_state, TerminalState::Completed);
                    assert!(result.daily_stats.row_count() > 0);
                    saw_complete = true;
                }
                UiEvent::Log { .. } => {}
                other => panic!("unexpected event: {other:?}"),
            }
        }

        cmd_tx.send(WorkerCommand::Shutdown).unwrap();
        handle.join().unwrap();
    }

    // A declined mismatch confirmation aborts the run without any error
    // reaching the front-end thread; Finished still fires.
    #[test]
    fn declined_mismatch_aborts_without_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let (cmd_tx, cmd_rx) = channel();
        let (event_tx, event_rx) = channel();
        let handle = spawn_worker(
            cmd_rx,
            event_tx,
            SettingsStore::in_memory(),
            CancelToken::new(),
        );

        cmd_tx.send(run_command(TriggerType::Min5, &dir)).unwrap();
        let (summary, _) = drain_until_finished(&event_rx, false);
        assert_eq!(summary.terminal, TerminalState::Aborted);

        // No RunComplete or RunError may follow an aborted run.
        cmd_tx.send(WorkerCommand::Shutdown).unwrap();
        handle.join().unwrap();
        while let Ok(event) = event_rx.recv() {
            assert!(
                !matches!(event, UiEvent::RunComplete(_) | UiEvent::RunError(_)),
                "aborted run must not surface an error: {event:?}"
            );
        }
    }

    #[test]
    fn accepted_mismatch_continues_to_completion() {
        let dir = tempfile::TempDir::new().unwrap();
        let (cmd_tx, cmd_rx) = channel();
        let (event_tx, event_rx) = channel();
        let handle = spawn_worker(
            cmd_rx,
            event_tx,
            SettingsStore::in_memory(),
            CancelToken::new(),
        );

        cmd_tx.send(run_command(TriggerType::Min5, &dir)).unwrap();
        let (summary, _) = drain_until_finished(&event_rx, true);
        assert_eq!(summary.terminal, TerminalState::Completed);

        cmd_tx.send(WorkerCommand::Shutdown).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn unknown_strategy_surfaces_run_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let (cmd_tx, cmd_rx) = channel();
        let (event_tx, event_rx) = channel();
        let handle = spawn_worker(
            cmd_rx,
            event_tx,
            SettingsStore::in_memory(),
            CancelToken::new(),
        );

        let mut bad = config(TriggerType::Day1);
        bad.strategy_ref = "no_such_strategy".into();
        cmd_tx
            .send(WorkerCommand::RunBacktest {
                config: bad,
                data_dir: dir.path().join("data"),
                results_root: dir.path().join("results"),
                synthetic_data: true,
            })
            .unwrap();

        match event_rx.recv().unwrap() {
            UiEvent::RunError(message) => assert!(message.contains("no_such_strategy")),
            other => panic!("expected RunError, got {other:?}"),
        }

        cmd_tx.send(WorkerCommand::Shutdown).unwrap();
        handle.join().unwrap();
    }
}
