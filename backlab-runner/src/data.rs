//! Market data loading: CSV bar cache with an optional provider refresh.
//!
//! The cache holds one CSV per symbol (`<root>/<SYMBOL>.csv`, header
//! `date,open,high,low,close,volume`). When data initialization is enabled
//! a provider fills cache misses before loading; when disabled the cache is
//! used as-is and a missing universe symbol is an error.

use std::path::{Path, PathBuf};

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use backlab_core::{Bar, KlinePeriod, MarketData};

/// Errors from the data layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no cached data for symbol '{0}' and data initialization is disabled")]
    MissingSymbol(String),
    #[error("provider failed for symbol '{symbol}': {reason}")]
    Provider { symbol: String, reason: String },
    #[error("cache read failed for {}: {source}", .path.display())]
    CacheRead {
        path: PathBuf,
        source: csv::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Options controlling one load.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Refresh cache misses through the provider before loading.
    pub init_data: bool,
}

/// Source of bars for symbols absent from the cache.
pub trait BarProvider {
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>, LoadError>;
}

/// Deterministic geometric-walk provider for offline and test use.
///
/// The per-symbol stream is seeded from the symbol name, so repeated runs
/// see identical data.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    pub seed: u64,
    pub base_price: f64,
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self {
            seed: 42,
            base_price: 10.0,
        }
    }
}

impl BarProvider for SyntheticProvider {
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>, LoadError> {
        let symbol_hash = blake3::hash(symbol.as_bytes());
        let mut seed_bytes = [0u8; 32];
        seed_bytes.copy_from_slice(symbol_hash.as_bytes());
        seed_bytes[..8].copy_from_slice(&self.seed.to_le_bytes());
        let mut rng = StdRng::from_seed(seed_bytes);

        let mut bars = Vec::new();
        let mut price = self.base_price * rng.gen_range(0.8..1.2);
        let mut date = start;
        while date <= end {
            if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                let drift: f64 = rng.gen_range(-0.02..0.022);
                let open = price;
                let close = (price * (1.0 + drift)).max(0.01);
                let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
                let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
                bars.push(Bar {
                    date,
                    open,
                    high,
                    low,
                    close,
                    volume: rng.gen_range(50_000..500_000),
                });
                price = close;
            }
            date = date + Duration::days(1);
        }
        Ok(bars)
    }
}

/// CSV row shape for the on-disk bar cache.
#[derive(Debug, Serialize, Deserialize)]
struct BarRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
}

/// File-per-symbol CSV cache of daily bars.
#[derive(Debug, Clone)]
pub struct CsvBarCache {
    root: PathBuf,
}

impl CsvBarCache {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self, symbol: &str) -> PathBuf {
        self.root.join(format!("{symbol}.csv"))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.path(symbol).is_file()
    }

    pub fn write(&self, symbol: &str, bars: &[Bar]) -> Result<(), LoadError> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.path(symbol);
        let mut writer = csv::Writer::from_path(&path).map_err(|e| to_cache_err(&path, e))?;
        for bar in bars {
            writer
                .serialize(BarRow {
                    date: bar.date,
                    open: bar.open,
                    high: bar.high,
                    low: bar.low,
                    close: bar.close,
                    volume: bar.volume,
                })
                .map_err(|e| to_cache_err(&path, e))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read(&self, symbol: &str) -> Result<Vec<Bar>, LoadError> {
        let path = self.path(symbol);
        let mut reader = csv::Reader::from_path(&path).map_err(|e| to_cache_err(&path, e))?;
        let mut bars = Vec::new();
        for row in reader.deserialize::<BarRow>() {
            let row = row.map_err(|e| to_cache_err(&path, e))?;
            bars.push(Bar {
                date: row.date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }
        Ok(bars)
    }
}

fn to_cache_err(path: &Path, source: csv::Error) -> LoadError {
    LoadError::CacheRead {
        path: path.to_path_buf(),
        source,
    }
}

/// Load market data for a run.
///
/// Universe symbols are required; the benchmark is loaded best-effort so a
/// benchmark gap degrades the benchmark artifact instead of the run.
pub fn load_market_data(
    universe: &[String],
    benchmark: Option<&str>,
    cache: &CsvBarCache,
    provider: Option<&dyn BarProvider>,
    opts: &LoadOptions,
) -> Result<MarketData, LoadError> {
    let mut data = MarketData::new().with_native_period(KlinePeriod::Day1);

    let mut wanted: Vec<(&str, bool)> = universe.iter().map(|s| (s.as_str(), true)).collect();
    if let Some(code) = benchmark {
        if !universe.iter().any(|s| s == code) {
            wanted.push((code, false));
        }
    }

    for (symbol, required) in wanted {
        if !cache.contains(symbol) {
            match (opts.init_data, provider) {
                (true, Some(provider)) => {
                    let bars = provider.fetch(symbol, opts.start, opts.end)?;
                    cache.write(symbol, &bars)?;
                }
                _ => {
                    if required {
                        return Err(LoadError::MissingSymbol(symbol.to_string()));
                    }
                    tracing::warn!("benchmark '{symbol}' not cached; continuing without it");
                    continue;
                }
            }
        }
        data.insert_series(symbol, cache.read(symbol)?);
    }

    Ok(data)
}
