//! Gaussian kernel density estimation
//!
//! One-dimensional KDE with Scott's-rule bandwidth, matching the behavior
//! of the usual scientific-stack estimator: bandwidth = n^(-1/5) * sample
//! standard deviation (unbiased), Gaussian kernel.

use ndarray::Array1;
use thiserror::Error;

/// Density estimation is undefined for a degenerate sample: fewer than two
/// observations, or zero variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("kernel density is undefined for a zero-variance sample")]
pub struct KdeError;

/// Gaussian kernel density estimate over a scalar sample.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianKde {
    samples: Vec<f64>,
    bandwidth: f64,
}

impl GaussianKde {
    /// Fit a KDE to `samples`.
    ///
    /// Fails with [`KdeError`] when the sample has fewer than two points or
    /// zero variance, in which case no density can be estimated and callers
    /// fall back to an order statistic.
    pub fn fit(samples: &[f64]) -> Result<Self, KdeError> {
        let n = samples.len();
        if n < 2 {
            return Err(KdeError);
        }

        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        if var <= 0.0 || !var.is_finite() {
            return Err(KdeError);
        }

        // Scott's rule: h = sigma * n^(-1/(d+4)), d = 1.
        let bandwidth = var.sqrt() * (n as f64).powf(-0.2);

        Ok(Self {
            samples: samples.to_vec(),
            bandwidth,
        })
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    /// Evaluate the density at each point of `xs`.
    pub fn evaluate(&self, xs: &Array1<f64>) -> Array1<f64> {
        let n = self.samples.len() as f64;
        let h = self.bandwidth;
        let norm = 1.0 / (n * h * (2.0 * std::f64::consts::PI).sqrt());

        xs.mapv(|x| {
            let acc: f64 = self
                .samples
                .iter()
                .map(|&s| (-0.5 * ((x - s) / h).powi(2)).exp())
                .sum();
            acc * norm
        })
    }

    /// Uniform evaluation grid over `[lo, hi]`.
    pub fn grid(lo: f64, hi: f64, points: usize) -> Array1<f64> {
        Array1::linspace(lo, hi, points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_variance_sample() {
        assert_eq!(GaussianKde::fit(&[50.0; 8]), Err(KdeError));
    }

    #[test]
    fn rejects_single_observation() {
        assert_eq!(GaussianKde::fit(&[3.0]), Err(KdeError));
    }

    #[test]
    fn density_integrates_to_about_one() {
        let samples = [1.0, 2.0, 2.5, 3.0, 4.0, 5.0, 5.5, 7.0];
        let kde = GaussianKde::fit(&samples).unwrap();

        // Integrate well beyond the sample range so the tails are covered.
        let xs = GaussianKde::grid(-20.0, 30.0, 5000);
        let ys = kde.evaluate(&xs);
        let dx = 50.0 / 4999.0;
        let mass: f64 = ys.sum() * dx;

        assert!((mass - 1.0).abs() < 1e-3, "total mass {mass}");
    }

    #[test]
    fn density_peaks_near_the_data() {
        let samples = [10.0, 10.2, 9.8, 10.1, 9.9, 10.0];
        let kde = GaussianKde::fit(&samples).unwrap();

        let near = kde.evaluate(&Array1::from(vec![10.0]))[0];
        let far = kde.evaluate(&Array1::from(vec![50.0]))[0];
        assert!(near > far * 1e6);
    }

    #[test]
    fn symmetric_sample_has_symmetric_density() {
        let samples = [52.0, 52.0, 92.0, 92.0];
        let kde = GaussianKde::fit(&samples).unwrap();

        let xs = Array1::from(vec![62.0, 82.0]);
        let ys = kde.evaluate(&xs);
        assert!((ys[0] - ys[1]).abs() < 1e-12);
    }
}
