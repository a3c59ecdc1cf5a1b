//! Built-in strategies and the registry that resolves strategy references.
//!
//! A strategy reference is a name or a path whose stem names a registered
//! strategy (`strategies/ma_crossover.strat` resolves as `ma_crossover`).
//! An unresolvable reference is an input error: the run never starts.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use backlab_core::{Strategy, StrategyContext, StrategyError};

/// Errors from strategy resolution.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("strategy reference '{0}' does not resolve to a known strategy")]
    Unknown(String),
    #[error("strategy reference is empty")]
    Empty,
}

/// Resolve a strategy reference to a boxed strategy instance.
pub fn resolve(reference: &str) -> Result<Box<dyn Strategy + Send>, RegistryError> {
    if reference.trim().is_empty() {
        return Err(RegistryError::Empty);
    }
    let name = Path::new(reference)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(reference);

    match name {
        "buy_and_hold" => Ok(Box::new(BuyAndHold::default())),
        "ma_crossover" => Ok(Box::new(MaCrossover::new(5, 20))),
        _ => Err(RegistryError::Unknown(reference.to_string())),
    }
}

/// Known strategy names, for diagnostics.
pub fn known_strategies() -> &'static [&'static str] {
    &["buy_and_hold", "ma_crossover"]
}

/// Buys every universe symbol once on the first bar and holds.
#[derive(Debug, Default)]
pub struct BuyAndHold {
    bought: bool,
}

impl Strategy for BuyAndHold {
    fn init(&mut self, _ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        self.bought = false;
        Ok(())
    }

    fn on_bar(&mut self, ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        if self.bought {
            return Ok(());
        }
        let codes: Vec<String> = ctx.universe().to_vec();
        let budget = ctx.cash() / codes.len() as f64;
        for code in &codes {
            if let Some(price) = ctx.close(code) {
                // Round down to whole lots of 100.
                let volume = ((budget * 0.99 / price) as i64 / 100) * 100;
                if volume > 0 {
                    ctx.buy(code, volume);
                }
            }
        }
        self.bought = true;
        Ok(())
    }
}

/// Moving-average crossover: long when the short MA is above the long MA,
/// flat otherwise.
#[derive(Debug)]
pub struct MaCrossover {
    short: usize,
    long: usize,
    holding: HashMap<String, bool>,
}

impl MaCrossover {
    pub fn new(short: usize, long: usize) -> Self {
        Self {
            short,
            long,
            holding: HashMap::new(),
        }
    }

    fn mean(values: &[f64]) -> f64 {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl Strategy for MaCrossover {
    fn init(&mut self, _ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        self.holding.clear();
        Ok(())
    }

    fn on_bar(&mut self, ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        let codes: Vec<String> = ctx.universe().to_vec();
        for code in &codes {
            let history = ctx.history(code, self.long);
            if history.len() < self.long {
                continue;
            }
            let short_ma = Self::mean(&history[history.len() - self.short..]);
            let long_ma = Self::mean(&history);
            let held = self.holding.get(code).copied().unwrap_or(false);

            if short_ma > long_ma && !held {
                if let Some(price) = ctx.close(code) {
                    let budget = ctx.cash() / codes.len() as f64;
                    let volume = ((budget * 0.99 / price) as i64 / 100) * 100;
                    if volume > 0 && ctx.buy(code, volume) {
                        self.holding.insert(code.clone(), true);
                    }
                }
            } else if short_ma < long_ma && held {
                let position = ctx.position(code);
                if position > 0 && ctx.sell(code, position) {
                    self.holding.insert(code.clone(), false);
                }
            }
        }
        Ok(())
    }
}
