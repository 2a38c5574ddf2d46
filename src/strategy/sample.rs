//! Sample preparation
//!
//! Validates a price series and flattens it into the 1-D sample set the
//! clustering stage consumes.

use crate::strategy::StrategyError;
use crate::types::Bar;

/// Flattened clustering input: one validated `[open, high, low, close]` row
/// per bar, plus the global price range.
#[derive(Debug, Clone)]
pub struct SampleSet {
    rows: Vec<[f64; 4]>,
    p_min: f64,
    p_max: f64,
}

impl SampleSet {
    /// Validate `bars` and flatten them into clustering samples.
    ///
    /// Fails with [`StrategyError::EmptySeries`] on zero bars,
    /// [`StrategyError::InsufficientData`] when the series is shorter than
    /// `min_data_points`, and [`StrategyError::MissingField`] when any bar
    /// lacks one of its OHLC values.
    pub fn prepare(bars: &[Bar], min_data_points: usize) -> Result<Self, StrategyError> {
        if bars.is_empty() {
            return Err(StrategyError::EmptySeries);
        }
        if bars.len() < min_data_points {
            return Err(StrategyError::InsufficientData {
                needed: min_data_points,
                got: bars.len(),
            });
        }

        let mut rows = Vec::with_capacity(bars.len());
        for (index, bar) in bars.iter().enumerate() {
            rows.push([
                require(bar.open, "open", index)?,
                require(bar.high, "high", index)?,
                require(bar.low, "low", index)?,
                require(bar.close, "close", index)?,
            ]);
        }

        let p_min = rows.iter().map(|r| r[2]).fold(f64::INFINITY, f64::min);
        let p_max = rows.iter().map(|r| r[1]).fold(f64::NEG_INFINITY, f64::max);

        Ok(Self { rows, p_min, p_max })
    }

    /// Per-bar `[open, high, low, close]` rows.
    pub fn rows(&self) -> &[[f64; 4]] {
        &self.rows
    }

    /// All 4n scalar samples in bar order.
    pub fn flat(&self) -> Vec<f64> {
        self.rows.iter().flat_map(|r| r.iter().copied()).collect()
    }

    /// Global price range: (minimum low, maximum high).
    pub fn price_range(&self) -> (f64, f64) {
        (self.p_min, self.p_max)
    }

    /// Number of scalar samples (4 per bar).
    pub fn len(&self) -> usize {
        self.rows.len() * 4
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn require(value: Option<f64>, field: &'static str, index: usize) -> Result<f64, StrategyError> {
    value
        .filter(|v| v.is_finite())
        .ok_or(StrategyError::MissingField { field, index })
}
