//! K-means sector strategy
//!
//! Partitions a historical price series into statistically coherent price
//! sectors (cluster-count selection by WCSS curvature, seeded K-means,
//! centroid-bounded partition) and derives a BUY/SELL/HOLD action from the
//! current price's position inside its sector.

pub mod cluster;
pub mod sample;
pub mod sector;

pub use cluster::{optimal_cluster_count, ClusterFit, KMeans};
pub use sample::SampleSet;
pub use sector::{build_sectors, Sector};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{Action, Bar, PriceSeries, SectorStats};

/// Errors surfaced by sector division.
///
/// Data-shape errors abort the whole call; a degenerate density estimate
/// ([`crate::stats::KdeError`]) is recovered per sector and never reaches
/// the caller.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("price series is empty")]
    EmptySeries,
    #[error("insufficient data: expected at least {needed} bars, got {got}")]
    InsufficientData { needed: usize, got: usize },
    #[error("bar {index} is missing its {field} price")]
    MissingField { field: &'static str, index: usize },
    #[error("not enough samples to form a single cluster")]
    InsufficientClusters,
    #[error("k-means did not converge within {max_iter} iterations in any of {n_init} restarts")]
    ClusteringFailed { max_iter: u32, n_init: u32 },
}

/// K-means configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringParams {
    /// Upper bound on the candidate cluster count
    pub max_clusters: usize,
    /// Base RNG seed; restart r uses seed + r
    pub seed: u64,
    /// Independent seeded restarts per fit
    pub n_init: u32,
    /// Lloyd iteration budget per restart
    pub max_iter: u32,
}

impl Default for ClusteringParams {
    fn default() -> Self {
        Self {
            max_clusters: 10,
            seed: 42,
            n_init: 10,
            max_iter: 300,
        }
    }
}

/// Sector statistics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorParams {
    /// Boundary deadband as a fraction of the sector width
    pub epsilon_factor: f64,
    /// Signal threshold as a fraction of the sector width
    pub threshold_factor: f64,
}

impl Default for SectorParams {
    fn default() -> Self {
        Self {
            epsilon_factor: 0.01,
            threshold_factor: 0.30,
        }
    }
}

/// Full parameter set consumed by [`SectorStrategy`]. Passed explicitly
/// into each instance; there is no process-wide configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyParams {
    /// Minimum number of bars required for analysis
    pub min_data_points: usize,
    pub clustering: ClusteringParams,
    pub sectors: SectorParams,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            min_data_points: 30,
            clustering: ClusteringParams::default(),
            sectors: SectorParams::default(),
        }
    }
}

/// Per-ticker strategy state: the price series, the sector partition built
/// from it, and the current price with its resolved sector.
///
/// The current sector is an index into the sector sequence, never an owning
/// reference; every [`divide_into_sectors`](Self::divide_into_sectors) call
/// rebuilds the sequence and re-resolves the index.
#[derive(Debug)]
pub struct SectorStrategy {
    ticker: String,
    bars: Vec<Bar>,
    params: StrategyParams,
    sectors: Vec<Sector>,
    current_price: Option<f64>,
    current_sector: Option<usize>,
}

impl SectorStrategy {
    /// Create a strategy for one ticker. The current price starts at the
    /// close of the most recent bar.
    pub fn new(series: PriceSeries, params: StrategyParams) -> Result<Self, StrategyError> {
        if series.len() < params.min_data_points {
            return Err(StrategyError::InsufficientData {
                needed: params.min_data_points,
                got: series.len(),
            });
        }
        let current_price = series.last_close();

        Ok(Self {
            ticker: series.ticker,
            bars: series.bars,
            params,
            sectors: Vec::new(),
            current_price,
            current_sector: None,
        })
    }

    /// Rebuild the sector partition from the full series.
    ///
    /// Flattens the series, selects the cluster count, fits K-means and
    /// converts the centroids into sectors; the previous partition and any
    /// resolved sector index are discarded wholesale.
    pub fn divide_into_sectors(&mut self) -> Result<(), StrategyError> {
        let samples = SampleSet::prepare(&self.bars, self.params.min_data_points)?;
        let flat = samples.flat();

        let k = optimal_cluster_count(&flat, &self.params.clustering)?;
        debug!(ticker = %self.ticker, k, "optimal cluster count selected");

        let fit = KMeans::new(k, &self.params.clustering).fit(&flat)?;
        debug!(ticker = %self.ticker, centroids = ?fit.centroids, "centroids fitted");

        self.sectors = build_sectors(&samples, &fit.centroids, &self.params.sectors);
        self.current_sector = None;
        if let Some(price) = self.current_price {
            self.update_current_price(price);
        }

        debug!(
            ticker = %self.ticker,
            sectors = self.sectors.len(),
            "sector division complete"
        );
        Ok(())
    }

    /// Track a new current price, re-resolving the sector when the price
    /// left the previous one.
    ///
    /// When no sector contains the price the previous index is kept stale
    /// rather than cleared, so the signal keeps a defined reference frame;
    /// the condition is logged.
    pub fn update_current_price(&mut self, price: f64) {
        self.current_price = Some(price);

        let still_inside = self
            .current_sector
            .and_then(|i| self.sectors.get(i))
            .map_or(false, |s| s.contains(price));
        if still_inside {
            return;
        }

        match self.sectors.iter().position(|s| s.contains(price)) {
            Some(i) => {
                debug!(ticker = %self.ticker, price, sector = i, "current sector resolved");
                self.current_sector = Some(i);
            }
            None => warn!(
                ticker = %self.ticker,
                price,
                "current price is outside every sector; keeping the previous sector"
            ),
        }
    }

    /// Derive the action for the current price. Pure: identical state
    /// always yields the same result, and missing state degrades to HOLD.
    pub fn determine_action(&self) -> Action {
        let price = match self.current_price {
            Some(p) => p,
            None => return Action::Hold,
        };
        let sector = match self.current_sector.and_then(|i| self.sectors.get(i)) {
            Some(s) => s,
            None => return Action::Hold,
        };

        // Boundary deadband: no signal near a regime change.
        if (price - sector.max_bound).abs() < sector.epsilon
            || (price - sector.min_bound).abs() < sector.epsilon
        {
            return Action::Hold;
        }

        if sector.expected_value > price + sector.threshold {
            Action::Buy
        } else if price > sector.expected_value + sector.threshold {
            Action::Sell
        } else {
            Action::Hold
        }
    }

    /// Ordered statistics snapshot for presentation; empty before division.
    pub fn sector_statistics(&self) -> Vec<SectorStats> {
        self.sectors.iter().map(Sector::stats).collect()
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    pub fn current_price(&self) -> Option<f64> {
        self.current_price
    }

    /// Index of the currently resolved sector, if any.
    pub fn current_sector(&self) -> Option<usize> {
        self.current_sector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(price: f64) -> Bar {
        Bar {
            ts: 0,
            open: Some(price),
            high: Some(price),
            low: Some(price),
            close: Some(price),
            volume: 0.0,
        }
    }

    #[test]
    fn construction_rejects_short_series() {
        let series = PriceSeries::new("AAPL", vec![bar(10.0); 10]);
        let err = SectorStrategy::new(series, StrategyParams::default()).unwrap_err();

        assert!(matches!(
            err,
            StrategyError::InsufficientData { needed: 30, got: 10 }
        ));
    }

    #[test]
    fn action_defaults_to_hold_without_state() {
        let series = PriceSeries::new("AAPL", vec![bar(10.0); 30]);
        let strategy = SectorStrategy::new(series, StrategyParams::default()).unwrap();

        // No division has run: no sectors, no resolved sector.
        assert_eq!(strategy.determine_action(), Action::Hold);
    }

    #[test]
    fn update_without_sectors_leaves_sector_unresolved() {
        let series = PriceSeries::new("AAPL", vec![bar(10.0); 30]);
        let mut strategy = SectorStrategy::new(series, StrategyParams::default()).unwrap();

        strategy.update_current_price(11.0);
        assert_eq!(strategy.current_price(), Some(11.0));
        assert_eq!(strategy.current_sector(), None);
    }
}
