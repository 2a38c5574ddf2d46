//! Configuration management for SectorBot
//!
//! Loads from config files + environment variables via .env

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::strategy::StrategyParams;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub feed: FeedConfig,
    pub strategy: StrategyParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the WebSocket server
    pub host: String,
    /// Bind port
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Base URL of the daily-bar feed
    pub base_url: String,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Server defaults
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8765)?
            // Feed defaults
            .set_default("feed.base_url", "https://stooq.com")?
            .set_default("feed.timeout_secs", 30)?
            // Strategy defaults
            .set_default("strategy.min_data_points", 30)?
            .set_default("strategy.clustering.max_clusters", 10)?
            .set_default("strategy.clustering.seed", 42)?
            .set_default("strategy.clustering.n_init", 10)?
            .set_default("strategy.clustering.max_iter", 300)?
            .set_default("strategy.sectors.epsilon_factor", 0.01)?
            .set_default("strategy.sectors.threshold_factor", 0.30)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (SECTORBOT_*)
            .add_source(Environment::with_prefix("SECTORBOT").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Generate a digest of the config for startup logging
    pub fn digest(&self) -> String {
        format!(
            "server={}:{} feed={} min_bars={} max_clusters={} seed={}",
            self.server.host,
            self.server.port,
            self.feed.base_url,
            self.strategy.min_data_points,
            self.strategy.clustering.max_clusters,
            self.strategy.clustering.seed
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
