//! Result parsing: turn a run's output directory back into a structured
//! `BacktestResult`.

use std::path::{Path, PathBuf};

use thiserror::Error;

use backlab_core::TerminalState;

/// The five files every finished run directory must contain.
pub const REQUIRED_FILES: [&str; 5] = [
    "trades.csv",
    "daily_stats.csv",
    "summary.csv",
    "benchmark.csv",
    "config.csv",
];

/// Errors from result parsing.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("backtest output directory not found: {}", .0.display())]
    MissingDir(PathBuf),
    /// An expected artifact is absent from an otherwise-completed run
    /// directory. This points at a writer defect, not an empty state.
    #[error("missing required artifact: {}", .0.display())]
    MissingArtifact(PathBuf),
    #[error("failed to parse {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        source: csv::Error,
    },
}

/// One parsed artifact: header plus string rows.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Value at (row, column-name), if present.
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.header.iter().position(|h| h == column)?;
        self.rows.get(row)?.get(idx).map(String::as_str)
    }
}

/// Summary metrics lifted out of `summary.csv`. Unparseable fields default
/// to zero, matching the writer's fallback row.
#[derive(Debug, Clone, Default)]
pub struct SummaryMetrics {
    pub init_capital: f64,
    pub final_capital: f64,
    pub total_return: f64,
    pub annual_return: f64,
    pub max_drawdown: f64,
    pub trade_days: usize,
}

impl SummaryMetrics {
    fn from_table(table: &Table) -> Self {
        let field = |name: &str| {
            table
                .value(0, name)
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(0.0)
        };
        Self {
            init_capital: field("init_capital"),
            final_capital: field("final_capital"),
            total_return: field("total_return"),
            annual_return: field("annual_return"),
            max_drawdown: field("max_drawdown"),
            trade_days: table
                .value(0, "trade_days")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(0),
        }
    }
}

/// Structured result of a terminal run, parsed back from its artifact set.
#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub output_dir: PathBuf,
    pub trades: Table,
    pub daily_stats: Table,
    pub summary: Table,
    pub benchmark: Table,
    pub config: Table,
    pub metrics: SummaryMetrics,
    /// Stamped by the caller that ran the engine; a bare directory parse
    /// reads as completed.
    pub terminal_state: TerminalState,
    pub error_summary: Option<String>,
}

fn parse_table(path: &Path) -> Result<Table, ParseError> {
    if !path.is_file() {
        return Err(ParseError::MissingArtifact(path.to_path_buf()));
    }
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|source| ParseError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    let header = reader
        .headers()
        .map_err(|source| ParseError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| ParseError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table { header, rows })
}

/// Parse a run's output directory into a `BacktestResult`.
pub fn parse_backtest_dir(output_dir: &Path) -> Result<BacktestResult, ParseError> {
    if !output_dir.is_dir() {
        return Err(ParseError::MissingDir(output_dir.to_path_buf()));
    }

    let trades = parse_table(&output_dir.join("trades.csv"))?;
    let daily_stats = parse_table(&output_dir.join("daily_stats.csv"))?;
    let summary = parse_table(&output_dir.join("summary.csv"))?;
    let benchmark = parse_table(&output_dir.join("benchmark.csv"))?;
    let config = parse_table(&output_dir.join("config.csv"))?;

    let metrics = SummaryMetrics::from_table(&summary);

    Ok(BacktestResult {
        output_dir: output_dir.to_path_buf(),
        trades,
        daily_stats,
        summary,
        benchmark,
        config,
        metrics,
        terminal_state: TerminalState::Completed,
        error_summary: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("backlab_result_{tag}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_all(dir: &Path) {
        std::fs::write(dir.join("trades.csv"), "datetime,code,action\n").unwrap();
        std::fs::write(
            dir.join("daily_stats.csv"),
            "date,total_asset\n2024-01-02,100000.0\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("summary.csv"),
            "init_capital,final_capital,total_return,annual_return,max_drawdown,trade_days\n\
             100000.0,101000.0,1.0,2.5,0.5,5\n",
        )
        .unwrap();
        std::fs::write(dir.join("benchmark.csv"), "date,close\n").unwrap();
        std::fs::write(dir.join("config.csv"), "start_time,end_time\n2024-01-02,2024-06-28\n")
            .unwrap();
    }

    #[test]
    fn parses_a_complete_directory() {
        let dir = scratch_dir("complete");
        write_all(&dir);

        let result = parse_backtest_dir(&dir).unwrap();
        assert_eq!(result.trades.row_count(), 0);
        assert_eq!(result.daily_stats.row_count(), 1);
        assert_eq!(result.metrics.trade_days, 5);
        assert!((result.metrics.total_return - 1.0).abs() < 1e-9);
        assert_eq!(result.benchmark.header, vec!["date", "close"]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_artifact_is_a_typed_error() {
        let dir = scratch_dir("missing");
        write_all(&dir);
        std::fs::remove_file(dir.join("summary.csv")).unwrap();

        let err = parse_backtest_dir(&dir).unwrap_err();
        assert!(matches!(err, ParseError::MissingArtifact(p) if p.ends_with("summary.csv")));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_is_distinct() {
        let err = parse_backtest_dir(Path::new("/nonexistent/run_dir")).unwrap_err();
        assert!(matches!(err, ParseError::MissingDir(_)));
    }

    #[test]
    fn table_lookup_by_column_name() {
        let dir = scratch_dir("lookup");
        write_all(&dir);

        let result = parse_backtest_dir(&dir).unwrap();
        assert_eq!(result.config.value(0, "start_time"), Some("2024-01-02"));
        assert_eq!(result.config.value(0, "absent"), None);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
