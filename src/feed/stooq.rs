//! Stooq historical data client
//!
//! Fetches the daily-bar CSV for a ticker from stooq.com. Tickers without
//! an explicit market suffix are treated as US listings.

use std::time::Duration as StdDuration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use tracing::{info, warn};

use crate::config::FeedConfig;
use crate::feed::{BarProvider, BarRequest};
use crate::types::{Bar, PriceSeries};

#[derive(Debug, Clone)]
pub struct StooqClient {
    base_url: String,
    client: reqwest::Client,
}

impl StooqClient {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn symbol_for(ticker: &str) -> String {
        let lower = ticker.to_lowercase();
        if lower.contains('.') {
            lower
        } else {
            format!("{lower}.us")
        }
    }
}

#[async_trait]
impl BarProvider for StooqClient {
    fn name(&self) -> &'static str {
        "Stooq"
    }

    async fn fetch_daily_bars(&self, ticker: &str, request: &BarRequest) -> Result<PriceSeries> {
        if request.bar_size != "1 day" {
            warn!(
                ticker,
                bar_size = %request.bar_size,
                "only daily bars are served; ignoring requested bar size"
            );
        }

        let days = lookback_days(&request.duration);
        let today = Utc::now().date_naive();
        let start = today - Duration::days(days);
        let url = format!(
            "{}/q/d/l/?s={}&d1={}&d2={}&i=d",
            self.base_url,
            Self::symbol_for(ticker),
            start.format("%Y%m%d"),
            today.format("%Y%m%d"),
        );

        info!(ticker, days, "📥 Fetching daily bars from Stooq...");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch daily bars from Stooq")?;

        if !response.status().is_success() {
            bail!("Stooq returned error status: {}", response.status());
        }

        let body = response
            .text()
            .await
            .context("Failed to read Stooq response body")?;
        let series = parse_daily_csv(ticker, &body)?;

        info!(ticker, count = series.len(), "✅ Daily bars fetched");
        Ok(series)
    }
}

/// One CSV row of the Stooq daily-bar payload. Prices are lenient: values
/// like "N/D" or blanks become `None` and are rejected later, during
/// sample preparation.
#[derive(Debug, Deserialize)]
struct DailyRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Open", deserialize_with = "lenient_f64", default)]
    open: Option<f64>,
    #[serde(rename = "High", deserialize_with = "lenient_f64", default)]
    high: Option<f64>,
    #[serde(rename = "Low", deserialize_with = "lenient_f64", default)]
    low: Option<f64>,
    #[serde(rename = "Close", deserialize_with = "lenient_f64", default)]
    close: Option<f64>,
    #[serde(rename = "Volume", deserialize_with = "lenient_f64", default)]
    volume: Option<f64>,
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().parse().ok())
}

/// Parse the CSV payload into an ascending price series. Rows that fail to
/// parse at all (e.g. a malformed date) are skipped.
fn parse_daily_csv(ticker: &str, body: &str) -> Result<PriceSeries> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut bars: Vec<Bar> = reader
        .deserialize::<DailyRow>()
        .filter_map(|row| row.ok())
        .filter_map(|row| {
            let ts = row.date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis();
            Some(Bar {
                ts,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume.unwrap_or(0.0),
            })
        })
        .collect();
    bars.sort_unstable_by_key(|b| b.ts);

    if bars.is_empty() {
        bail!("no data received for {ticker}");
    }
    Ok(PriceSeries::new(ticker, bars))
}

/// Map an IB-style duration string ("10 D", "3 W", "1 M", "1 Y") onto a
/// calendar lookback. Unrecognized values fall back to one month.
fn lookback_days(duration: &str) -> i64 {
    let mut parts = duration.split_whitespace();
    let count: Option<i64> = parts.next().and_then(|n| n.parse().ok());
    let unit = parts.next().map(str::to_ascii_uppercase);

    match (count, unit.as_deref()) {
        (Some(n), Some("D")) if n > 0 => n,
        (Some(n), Some("W")) if n > 0 => n * 7,
        (Some(n), Some("M")) if n > 0 => n * 30,
        (Some(n), Some("Y")) if n > 0 => n * 365,
        _ => {
            warn!(duration, "unrecognized duration; defaulting to one month");
            30
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = "\
Date,Open,High,Low,Close,Volume
2024-01-03,184.22,185.88,183.43,184.25,58414500
2024-01-02,187.15,188.44,183.89,185.64,82488700
2024-01-04,182.15,183.09,180.88,181.91,71983600
";

    #[test]
    fn parses_and_sorts_daily_rows() {
        let series = parse_daily_csv("AAPL", FIXTURE).unwrap();

        assert_eq!(series.ticker, "AAPL");
        assert_eq!(series.len(), 3);
        // Rows come back ascending regardless of payload order.
        assert_eq!(series.bars[0].open, Some(187.15));
        assert_eq!(series.bars[2].close, Some(181.91));
        assert!(series.bars.windows(2).all(|w| w[0].ts < w[1].ts));
    }

    #[test]
    fn absent_values_become_none() {
        let body = "\
Date,Open,High,Low,Close,Volume
2024-01-02,187.15,N/D,183.89,,82488700
";
        let series = parse_daily_csv("AAPL", body).unwrap();
        let bar = &series.bars[0];

        assert_eq!(bar.open, Some(187.15));
        assert_eq!(bar.high, None);
        assert_eq!(bar.close, None);
    }

    #[test]
    fn empty_payload_is_an_error() {
        assert!(parse_daily_csv("AAPL", "Date,Open,High,Low,Close,Volume\n").is_err());
    }

    #[test]
    fn maps_duration_strings_to_days() {
        assert_eq!(lookback_days("10 D"), 10);
        assert_eq!(lookback_days("3 W"), 21);
        assert_eq!(lookback_days("1 M"), 30);
        assert_eq!(lookback_days("2 Y"), 730);
        assert_eq!(lookback_days("garbage"), 30);
    }

    #[test]
    fn us_tickers_get_the_market_suffix() {
        assert_eq!(StooqClient::symbol_for("AAPL"), "aapl.us");
        assert_eq!(StooqClient::symbol_for("CDR.PL"), "cdr.pl");
    }
}
