//! Core types used throughout SectorBot
//!
//! Defines common data structures for bars, price series, actions and
//! exported sector statistics.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single OHLCV bar.
///
/// OHLC fields are optional at ingestion: the feed can deliver gaps, and
/// missing values are rejected during sample preparation rather than at
/// parse time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar timestamp in milliseconds (start of the session)
    pub ts: i64,
    /// Open price
    pub open: Option<f64>,
    /// High price
    pub high: Option<f64>,
    /// Low price
    pub low: Option<f64>,
    /// Close price
    pub close: Option<f64>,
    /// Volume in shares
    pub volume: f64,
}

impl Bar {
    /// Session date in UTC.
    pub fn date(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.ts)
            .single()
            .unwrap_or_default()
    }
}

/// Historical price series for one ticker, ascending by timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    /// Ticker symbol (e.g. "AAPL")
    pub ticker: String,
    /// Bars sorted ascending by `ts`
    pub bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(ticker: impl Into<String>, bars: Vec<Bar>) -> Self {
        Self {
            ticker: ticker.into(),
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Close of the most recent bar, if present.
    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().and_then(|b| b.close)
    }
}

/// Trading action derived from the current price's sector position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Default for Action {
    fn default() -> Self {
        Action::Hold
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

/// Per-sector statistics exported for presentation.
///
/// Field names match the original wire envelope (`kdeX`/`kdeY` included).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorStats {
    /// Dense sector index, ascending by lower bound
    pub num: usize,
    pub min_bound: f64,
    pub max_bound: f64,
    pub median: f64,
    pub expected_value: f64,
    pub epsilon: f64,
    pub threshold: f64,
    /// 200-point KDE curve abscissae (presentation only)
    #[serde(rename = "kdeX")]
    pub kde_x: Vec<f64>,
    /// 200-point KDE curve densities (presentation only)
    #[serde(rename = "kdeY")]
    pub kde_y: Vec<f64>,
}
