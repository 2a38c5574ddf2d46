//! SectorBot server binary
//!
//! Loads configuration, wires the Stooq feed into the WebSocket server and
//! serves sector analysis requests until interrupted.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sectorbot::config::AppConfig;
use sectorbot::feed::StooqClient;
use sectorbot::server::TradingServer;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    info!(config = %config.digest(), "🚀 Starting SectorBot");

    let provider = Arc::new(StooqClient::new(&config.feed)?);
    let server = TradingServer::new(config, provider);

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            Ok(())
        }
    }
}
