//! K-means clustering and cluster-count selection
//!
//! Lloyd's algorithm over the 1-D sample set with k-means++ seeding and a
//! fixed number of seeded restarts, plus the WCSS-curvature (elbow)
//! heuristic that picks the cluster count. Everything here is deterministic
//! for a fixed seed: restarts run in seed order and ties keep the earlier
//! candidate.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::strategy::{ClusteringParams, StrategyError};

/// Result of one K-means fit: ascending centroids, per-sample labels into
/// the sorted centroids (diagnostic only) and the within-cluster sum of
/// squares of the kept restart.
#[derive(Debug, Clone)]
pub struct ClusterFit {
    pub centroids: Vec<f64>,
    pub labels: Vec<usize>,
    pub wcss: f64,
}

/// Seeded 1-D K-means estimator.
#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    seed: u64,
    n_init: u32,
    max_iter: u32,
}

impl KMeans {
    pub fn new(k: usize, params: &ClusteringParams) -> Self {
        Self {
            k,
            seed: params.seed,
            n_init: params.n_init,
            max_iter: params.max_iter,
        }
    }

    /// Run `n_init` independent seeded restarts and keep the lowest-WCSS
    /// converged run. Fails with [`StrategyError::ClusteringFailed`] when no
    /// restart converges within the iteration budget.
    pub fn fit(&self, samples: &[f64]) -> Result<ClusterFit, StrategyError> {
        let mut best: Option<ClusterFit> = None;

        for run in 0..self.n_init {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(u64::from(run)));
            if let Some(fit) = self.run_once(samples, &mut rng) {
                if best.as_ref().map_or(true, |b| fit.wcss < b.wcss) {
                    best = Some(fit);
                }
            }
        }

        best.ok_or(StrategyError::ClusteringFailed {
            max_iter: self.max_iter,
            n_init: self.n_init,
        })
    }

    /// One seeded Lloyd run; `None` when the labels never stabilize.
    fn run_once(&self, samples: &[f64], rng: &mut StdRng) -> Option<ClusterFit> {
        let mut centroids = seed_centroids(samples, self.k, rng);
        let mut labels = assign(samples, &centroids);
        let mut converged = false;

        for _ in 0..self.max_iter {
            update_centroids(samples, &labels, &mut centroids);
            let next = assign(samples, &centroids);
            if next == labels {
                converged = true;
                break;
            }
            labels = next;
        }
        if !converged {
            return None;
        }

        centroids.sort_by(f64::total_cmp);
        let labels = assign(samples, &centroids);
        let wcss = samples
            .iter()
            .zip(&labels)
            .map(|(&x, &l)| (x - centroids[l]).powi(2))
            .sum();

        Some(ClusterFit {
            centroids,
            labels,
            wcss,
        })
    }
}

/// k-means++ seeding: the first centroid is drawn uniformly, each further
/// one with probability proportional to the squared distance to its nearest
/// already-chosen centroid.
fn seed_centroids(samples: &[f64], k: usize, rng: &mut StdRng) -> Vec<f64> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(samples[rng.gen_range(0..samples.len())]);

    while centroids.len() < k {
        let weights: Vec<f64> = samples
            .iter()
            .map(|&x| {
                centroids
                    .iter()
                    .map(|&c| (x - c).powi(2))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = weights.iter().sum();

        let next = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = samples.len() - 1;
            for (i, &w) in weights.iter().enumerate() {
                if target < w {
                    chosen = i;
                    break;
                }
                target -= w;
            }
            samples[chosen]
        } else {
            // every sample already coincides with a centroid
            samples[rng.gen_range(0..samples.len())]
        };
        centroids.push(next);
    }

    centroids
}

/// Nearest-centroid labels; ties keep the lower index.
fn assign(samples: &[f64], centroids: &[f64]) -> Vec<usize> {
    samples
        .iter()
        .map(|&x| {
            let mut best = 0;
            let mut best_dist = f64::INFINITY;
            for (j, &c) in centroids.iter().enumerate() {
                let dist = (x - c).abs();
                if dist < best_dist {
                    best_dist = dist;
                    best = j;
                }
            }
            best
        })
        .collect()
}

/// Recompute each centroid as the mean of its assigned samples. A cluster
/// that lost every sample keeps its previous centroid.
fn update_centroids(samples: &[f64], labels: &[usize], centroids: &mut [f64]) {
    let mut sums = vec![0.0; centroids.len()];
    let mut counts = vec![0usize; centroids.len()];

    for (&x, &l) in samples.iter().zip(labels) {
        sums[l] += x;
        counts[l] += 1;
    }
    for (j, centroid) in centroids.iter_mut().enumerate() {
        if counts[j] > 0 {
            *centroid = sums[j] / counts[j] as f64;
        }
    }
}

/// Pick the cluster count by discrete curvature over the WCSS sequence.
///
/// max_k = min(configured maximum, n_samples / 2); for every candidate k a
/// full seeded fit records the best-restart WCSS, and the interior point
/// with the largest curvature wins. Defaults to 1 when no interior point
/// exists (max_k < 3) or no curvature is positive.
pub fn optimal_cluster_count(
    samples: &[f64],
    params: &ClusteringParams,
) -> Result<usize, StrategyError> {
    let max_k = params.max_clusters.min(samples.len() / 2);
    if max_k < 1 {
        return Err(StrategyError::InsufficientClusters);
    }

    let mut wcss = Vec::with_capacity(max_k);
    for k in 1..=max_k {
        wcss.push(KMeans::new(k, params).fit(samples)?.wcss);
    }

    let mut best_k = 1;
    let mut best_curvature = 0.0;
    for j in 1..max_k.saturating_sub(1) {
        let second_diff = wcss[j - 1] - 2.0 * wcss[j] + wcss[j + 1];
        let slope = wcss[j] - wcss[j - 1];
        let curvature = second_diff / (1.0 + slope * slope).powf(1.5);
        if curvature > best_curvature {
            best_curvature = curvature;
            best_k = j + 1;
        }
    }

    Ok(best_k)
}
