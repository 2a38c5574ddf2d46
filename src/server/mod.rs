//! WebSocket request/response server
//!
//! Accepts `get_historical_data` requests, evaluates the sector strategy
//! per ticker and replies with one `historical_data` envelope. Per-ticker
//! failures are reported inside the envelope and never abort the batch.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::feed::{BarProvider, BarRequest};
use crate::strategy::{SectorStrategy, StrategyParams};
use crate::types::{Action, SectorStats};

/// Inbound client messages.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientRequest {
    GetHistoricalData(HistoricalDataRequest),
}

#[derive(Debug, Deserialize)]
struct HistoricalDataRequest {
    tickers: Vec<String>,
    #[serde(default = "default_duration")]
    duration: String,
    #[serde(rename = "barSize", default = "default_bar_size")]
    bar_size: String,
    #[serde(default = "default_rth")]
    rth: bool,
}

fn default_duration() -> String {
    "1 M".to_string()
}

fn default_bar_size() -> String {
    "1 day".to_string()
}

fn default_rth() -> bool {
    true
}

/// Response envelope; ticker payloads sit at the top level next to `type`
/// and `tickers`, matching the original wire shape.
#[derive(Debug, Serialize)]
struct HistoricalDataResponse {
    r#type: &'static str,
    tickers: Vec<String>,
    #[serde(flatten)]
    results: HashMap<String, TickerResult>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum TickerResult {
    Data(Box<TickerPayload>),
    Error { error: String },
}

#[derive(Debug, Serialize)]
struct TickerPayload {
    dates: Vec<String>,
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<f64>,
    sectors: Vec<SectorStats>,
    action: Action,
}

/// WebSocket server wiring the feed and the strategy together.
pub struct TradingServer {
    config: Arc<AppConfig>,
    provider: Arc<dyn BarProvider>,
}

impl TradingServer {
    pub fn new(config: AppConfig, provider: Arc<dyn BarProvider>) -> Self {
        Self {
            config: Arc::new(config),
            provider,
        }
    }

    /// Bind and serve until the task is cancelled.
    pub async fn run(&self) -> Result<()> {
        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        info!(%addr, provider = self.provider.name(), "✅ WebSocket server listening");

        loop {
            let (stream, peer) = listener
                .accept()
                .await
                .context("Failed to accept connection")?;
            let config = Arc::clone(&self.config);
            let provider = Arc::clone(&self.provider);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer, config, provider).await {
                    warn!(%peer, error = %e, "Connection closed with error");
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    config: Arc<AppConfig>,
    provider: Arc<dyn BarProvider>,
) -> Result<()> {
    let ws = accept_async(stream)
        .await
        .context("WebSocket handshake failed")?;
    info!(%peer, "Client connected");
    let (mut write, mut read) = ws.split();

    while let Some(message) = read.next().await {
        match message? {
            Message::Text(text) => match serde_json::from_str::<ClientRequest>(&text) {
                Ok(ClientRequest::GetHistoricalData(request)) => {
                    let response = process_historical_data_request(
                        &config.strategy,
                        provider.as_ref(),
                        &request,
                    )
                    .await;
                    write
                        .send(Message::Text(serde_json::to_string(&response)?))
                        .await?;
                }
                Err(e) => warn!(%peer, error = %e, "Ignoring unrecognized message"),
            },
            Message::Ping(data) => write.send(Message::Pong(data)).await?,
            Message::Close(_) => break,
            _ => {}
        }
    }

    info!(%peer, "Client disconnected");
    Ok(())
}

/// Evaluate every requested ticker; a failing ticker contributes an error
/// entry and leaves its siblings untouched.
async fn process_historical_data_request(
    params: &StrategyParams,
    provider: &dyn BarProvider,
    request: &HistoricalDataRequest,
) -> HistoricalDataResponse {
    let bar_request = BarRequest {
        duration: request.duration.clone(),
        bar_size: request.bar_size.clone(),
        rth: request.rth,
    };

    let mut results = HashMap::new();
    for ticker in &request.tickers {
        match process_ticker(params, provider, ticker, &bar_request).await {
            Ok(payload) => {
                results.insert(ticker.clone(), TickerResult::Data(Box::new(payload)));
            }
            Err(e) => {
                error!(ticker = %ticker, error = %e, "Error processing ticker");
                results.insert(
                    ticker.clone(),
                    TickerResult::Error {
                        error: e.to_string(),
                    },
                );
            }
        }
    }

    HistoricalDataResponse {
        r#type: "historical_data",
        tickers: request.tickers.clone(),
        results,
    }
}

async fn process_ticker(
    params: &StrategyParams,
    provider: &dyn BarProvider,
    ticker: &str,
    request: &BarRequest,
) -> Result<TickerPayload> {
    let series = provider.fetch_daily_bars(ticker, request).await?;

    let mut strategy = SectorStrategy::new(series, params.clone())?;
    strategy.divide_into_sectors()?;
    let action = strategy.determine_action();

    info!(
        ticker,
        action = %action,
        sectors = strategy.sectors().len(),
        "Ticker evaluated"
    );
    Ok(payload_from(&strategy, action))
}

fn payload_from(strategy: &SectorStrategy, action: Action) -> TickerPayload {
    let bars = strategy.bars();
    TickerPayload {
        dates: bars
            .iter()
            .map(|b| b.date().format("%Y-%m-%d").to_string())
            .collect(),
        open: bars.iter().map(|b| b.open).collect(),
        high: bars.iter().map(|b| b.high).collect(),
        low: bars.iter().map(|b| b.low).collect(),
        close: bars.iter().map(|b| b.close).collect(),
        volume: bars.iter().map(|b| b.volume).collect(),
        sectors: strategy.sector_statistics(),
        action,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bar, PriceSeries};

    struct StubFeed;

    #[async_trait::async_trait]
    impl BarProvider for StubFeed {
        fn name(&self) -> &'static str {
            "Stub"
        }

        async fn fetch_daily_bars(
            &self,
            ticker: &str,
            _request: &BarRequest,
        ) -> Result<PriceSeries> {
            if ticker == "BAD" {
                anyhow::bail!("no data received for BAD");
            }
            let bars = (0..30)
                .map(|i| {
                    let price = if i % 2 == 0 { 10.0 } else { 90.0 };
                    Bar {
                        ts: i * 86_400_000,
                        open: Some(price),
                        high: Some(price),
                        low: Some(price),
                        close: Some(price),
                        volume: 1000.0,
                    }
                })
                .collect();
            Ok(PriceSeries::new(ticker, bars))
        }
    }

    fn request(tickers: &[&str]) -> HistoricalDataRequest {
        HistoricalDataRequest {
            tickers: tickers.iter().map(|t| t.to_string()).collect(),
            duration: default_duration(),
            bar_size: default_bar_size(),
            rth: true,
        }
    }

    #[test]
    fn deserializes_the_original_request_shape() {
        let json = r#"{
            "type": "get_historical_data",
            "tickers": ["AAPL", "MSFT"],
            "barSize": "1 day",
            "duration": "1 M",
            "rth": true
        }"#;

        let ClientRequest::GetHistoricalData(req) = serde_json::from_str(json).unwrap();
        assert_eq!(req.tickers, vec!["AAPL", "MSFT"]);
        assert_eq!(req.bar_size, "1 day");
        assert_eq!(req.duration, "1 M");
        assert!(req.rth);
    }

    #[tokio::test]
    async fn ticker_payloads_flatten_into_the_envelope() {
        let response =
            process_historical_data_request(&StrategyParams::default(), &StubFeed, &request(&["GOOD"]))
                .await;

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["type"], "historical_data");
        assert_eq!(value["tickers"][0], "GOOD");
        assert_eq!(value["GOOD"]["dates"].as_array().unwrap().len(), 30);
        assert!(!value["GOOD"]["sectors"].as_array().unwrap().is_empty());
        assert!(value["GOOD"]["action"].is_string());
    }

    #[tokio::test]
    async fn a_failing_ticker_does_not_abort_its_siblings() {
        let response = process_historical_data_request(
            &StrategyParams::default(),
            &StubFeed,
            &request(&["GOOD", "BAD"]),
        )
        .await;

        let value = serde_json::to_value(&response).unwrap();
        assert!(value["GOOD"]["sectors"].is_array());
        assert_eq!(value["BAD"]["error"], "no data received for BAD");
    }
}
