//! In-memory market data set for one run: per-symbol daily bars plus the
//! trading calendar they imply.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::config::KlinePeriod;
use crate::domain::Bar;

/// Loaded market data, read-only for the run's duration.
#[derive(Debug, Clone, Default)]
pub struct MarketData {
    bars: BTreeMap<String, BTreeMap<NaiveDate, Bar>>,
    /// Native period of the loaded series, when the source declares one.
    native_period: Option<KlinePeriod>,
}

impl MarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_native_period(mut self, period: KlinePeriod) -> Self {
        self.native_period = Some(period);
        self
    }

    /// Period the data actually carries, falling back to `configured` when
    /// the source declared none.
    pub fn effective_period(&self, configured: KlinePeriod) -> KlinePeriod {
        self.native_period.unwrap_or(configured)
    }

    pub fn insert_series(&mut self, symbol: &str, series: Vec<Bar>) {
        let by_date = series.into_iter().map(|b| (b.date, b)).collect();
        self.bars.insert(symbol.to_string(), by_date);
    }

    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.bars.contains_key(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.bars.keys().map(String::as_str)
    }

    pub fn bar(&self, symbol: &str, date: NaiveDate) -> Option<&Bar> {
        self.bars.get(symbol)?.get(&date)
    }

    pub fn close(&self, symbol: &str, date: NaiveDate) -> Option<f64> {
        self.bar(symbol, date).map(|b| b.close)
    }

    /// Closes for the last `len` trading days of `symbol` up to and
    /// including `date`, oldest first.
    pub fn history(&self, symbol: &str, date: NaiveDate, len: usize) -> Vec<f64> {
        let Some(series) = self.bars.get(symbol) else {
            return Vec::new();
        };
        let mut closes: Vec<f64> = series
            .range(..=date)
            .rev()
            .take(len)
            .map(|(_, b)| b.close)
            .collect();
        closes.reverse();
        closes
    }

    /// Tradable dates within `[start, end]` across the given symbols
    /// (union of their calendars), ascending.
    pub fn calendar(&self, symbols: &[String], start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = Vec::new();
        for symbol in symbols {
            if let Some(series) = self.bars.get(symbol) {
                for date in series.range(start..=end).map(|(d, _)| *d) {
                    if let Err(pos) = dates.binary_search(&date) {
                        dates.insert(pos, date);
                    }
                }
            }
        }
        dates
    }

    /// `(date, close)` series for one symbol within `[start, end]`.
    pub fn close_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<Vec<(NaiveDate, f64)>> {
        let series = self.bars.get(symbol)?;
        Some(
            series
                .range(start..=end)
                .map(|(d, b)| (*d, b.close))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: NaiveDate, close: f64) -> Bar {
        Bar {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn calendar_is_union_of_symbol_dates() {
        let mut data = MarketData::new();
        data.insert_series("A", vec![bar(day(2), 10.0), bar(day(3), 11.0)]);
        data.insert_series("B", vec![bar(day(3), 20.0), bar(day(4), 21.0)]);

        let calendar = data.calendar(&["A".into(), "B".into()], day(1), day(31));
        assert_eq!(calendar, vec![day(2), day(3), day(4)]);
    }

    #[test]
    fn calendar_respects_range_bounds() {
        let mut data = MarketData::new();
        data.insert_series("A", vec![bar(day(2), 10.0), bar(day(10), 11.0)]);

        let calendar = data.calendar(&["A".into()], day(3), day(31));
        assert_eq!(calendar, vec![day(10)]);
    }

    #[test]
    fn history_is_oldest_first_and_bounded() {
        let mut data = MarketData::new();
        data.insert_series(
            "A",
            vec![bar(day(2), 1.0), bar(day(3), 2.0), bar(day(4), 3.0)],
        );

        assert_eq!(data.history("A", day(4), 2), vec![2.0, 3.0]);
        assert_eq!(data.history("A", day(4), 10), vec![1.0, 2.0, 3.0]);
        assert!(data.history("missing", day(4), 2).is_empty());
    }

    #[test]
    fn effective_period_prefers_native() {
        let data = MarketData::new().with_native_period(KlinePeriod::Day1);
        assert_eq!(data.effective_period(KlinePeriod::Min5), KlinePeriod::Day1);

        let bare = MarketData::new();
        assert_eq!(bare.effective_period(KlinePeriod::Min5), KlinePeriod::Min5);
    }
}
