//! Historical bar feed
//!
//! Providers deliver daily OHLCV bars per ticker. The strategy engine stays
//! feed-agnostic behind [`BarProvider`].

mod stooq;

pub use stooq::StooqClient;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::PriceSeries;

/// Parameters of one historical-bar retrieval.
#[derive(Debug, Clone)]
pub struct BarRequest {
    /// Lookback window, e.g. "10 D", "3 W", "1 M", "1 Y"
    pub duration: String,
    /// Bar size; only "1 day" is currently served
    pub bar_size: String,
    /// Regular trading hours only (informational for daily bars)
    pub rth: bool,
}

impl Default for BarRequest {
    fn default() -> Self {
        Self {
            duration: "1 M".to_string(),
            bar_size: "1 day".to_string(),
            rth: true,
        }
    }
}

/// A source of historical daily bars.
#[async_trait]
pub trait BarProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Fetch daily bars for `ticker` over the requested window, sorted
    /// ascending by timestamp.
    async fn fetch_daily_bars(&self, ticker: &str, request: &BarRequest) -> Result<PriceSeries>;
}
