//! Sector construction and per-sector statistics
//!
//! Sorted centroids become an ordered, gap-free partition of the price
//! range. Membership selection is closed on both ends and keeps the whole
//! OHLC row of a qualifying bar; current-price containment is half-open.
//! The asymmetry is deliberate and covered by tests.

use tracing::debug;

use crate::stats::{GaussianKde, KdeError};
use crate::strategy::sample::SampleSet;
use crate::strategy::SectorParams;
use crate::types::SectorStats;

/// Grid resolution for the expected-value integral.
const EXPECTED_VALUE_GRID: usize = 1000;
/// Grid resolution for the exported presentation curve.
const EXPORT_CURVE_POINTS: usize = 200;

/// A contiguous price interval with its statistical profile.
#[derive(Debug, Clone)]
pub struct Sector {
    /// Dense index, ascending by lower bound
    pub index: usize,
    pub min_bound: f64,
    pub max_bound: f64,
    /// Sample prices selected into this sector
    pub prices: Vec<f64>,
    /// Order-statistic median of the selected prices
    pub median: f64,
    /// Density-weighted mean over the sector interval
    pub expected_value: f64,
    /// Boundary deadband width
    pub epsilon: f64,
    /// Minimum deviation from the expected value that triggers a signal
    pub threshold: f64,
    /// Relative width of the interval
    pub size: f64,
}

impl Sector {
    fn new(
        index: usize,
        min_bound: f64,
        max_bound: f64,
        prices: Vec<f64>,
        params: &SectorParams,
    ) -> Self {
        let median = median(&prices);
        let width = max_bound - min_bound;

        let expected_value = match density_weighted_mean(&prices, min_bound, max_bound) {
            Ok(ev) => ev,
            Err(KdeError) => {
                debug!(
                    index,
                    median, "degenerate sector sample; expected value falls back to the median"
                );
                median
            }
        };

        let size = if min_bound != 0.0 {
            width / min_bound
        } else {
            width
        };

        Self {
            index,
            min_bound,
            max_bound,
            prices,
            median,
            expected_value,
            epsilon: params.epsilon_factor * width,
            threshold: params.threshold_factor * width,
            size,
        }
    }

    /// Half-open containment used for current-price tracking: a price equal
    /// to `max_bound` belongs to the next sector, never this one.
    pub fn contains(&self, price: f64) -> bool {
        self.min_bound <= price && price < self.max_bound
    }

    /// 200-point KDE curve over the sector interval, for presentation only.
    /// A degenerate sample renders as a single spike at the shared price.
    pub fn kde_curve(&self) -> (Vec<f64>, Vec<f64>) {
        let xs = GaussianKde::grid(self.min_bound, self.max_bound, EXPORT_CURVE_POINTS);
        match GaussianKde::fit(&self.prices) {
            Ok(kde) => {
                let ys = kde.evaluate(&xs);
                (xs.to_vec(), ys.to_vec())
            }
            Err(KdeError) => {
                let price = self.prices.first().copied().unwrap_or(self.min_bound);
                let mut ys = vec![0.0; xs.len()];
                let spike = xs
                    .iter()
                    .enumerate()
                    .min_by(|(_, a), (_, b)| {
                        (*a - price).abs().total_cmp(&(*b - price).abs())
                    })
                    .map(|(i, _)| i);
                if let Some(i) = spike {
                    ys[i] = 1.0;
                }
                (xs.to_vec(), ys)
            }
        }
    }

    /// Exportable statistics snapshot.
    pub fn stats(&self) -> SectorStats {
        let (kde_x, kde_y) = self.kde_curve();
        SectorStats {
            num: self.index,
            min_bound: self.min_bound,
            max_bound: self.max_bound,
            median: self.median,
            expected_value: self.expected_value,
            epsilon: self.epsilon,
            threshold: self.threshold,
            kde_x,
            kde_y,
        }
    }
}

/// Convert sorted centroids into the surviving sector sequence.
///
/// Candidate bounds are `[p_min, c_1)`, `[c_i, c_{i+1})`, `[c_k, p_max]`.
/// A bar whose row has at least one OHLC value inside the closed candidate
/// interval contributes all four of its values. Candidates left without
/// prices are dropped and the survivors renumbered densely.
pub fn build_sectors(samples: &SampleSet, centroids: &[f64], params: &SectorParams) -> Vec<Sector> {
    let (p_min, p_max) = samples.price_range();
    let k = centroids.len();
    let mut sectors: Vec<Sector> = Vec::with_capacity(k + 1);

    for i in 0..=k {
        let min_bound = if i == 0 { p_min } else { centroids[i - 1] };
        let max_bound = if i == k { p_max } else { centroids[i] };

        let prices: Vec<f64> = samples
            .rows()
            .iter()
            .filter(|row| row.iter().any(|&v| v >= min_bound && v <= max_bound))
            .flat_map(|row| row.iter().copied())
            .collect();

        if prices.is_empty() {
            continue;
        }
        let index = sectors.len();
        debug!(index, min_bound, max_bound, samples = prices.len(), "adding sector");
        sectors.push(Sector::new(index, min_bound, max_bound, prices, params));
    }

    sectors
}

/// Order-statistic median; even-length samples average the middle pair.
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Discrete approximation of the conditional mean under the estimated
/// density: sum(x * f(x)) / sum(f(x)) over a uniform grid on the interval.
fn density_weighted_mean(prices: &[f64], lo: f64, hi: f64) -> Result<f64, KdeError> {
    let kde = GaussianKde::fit(prices)?;
    let xs = GaussianKde::grid(lo, hi, EXPECTED_VALUE_GRID);
    let ys = kde.evaluate(&xs);

    let total = ys.sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(KdeError);
    }
    Ok((&xs * &ys).sum() / total)
}
