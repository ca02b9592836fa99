//! Parameter estimator: clustering parameters from the data geometry
//!
//! - `eps` is a knee on the sorted k-nearest-neighbour distances, placed so
//!   that roughly `n_errors` points fall outside the dense bulk.
//! - `min_samples` scales with the expected minority size.
//! - The mean-shift bandwidth is the mean distance to a quantile-ranked
//!   neighbour within a seeded row subset.
//!
//! Everything here is deterministic for a given input and seed.

use crate::config::ExperimentConfig;
use crate::error::{AnalysisError, Result, Stage};
use crate::neighbors::DistanceMatrix;
use crate::sampler::round_half_even;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

/// Bandwidth used when the estimate collapses to zero
pub const FALLBACK_BANDWIDTH: f32 = 1.0;

/// Settings that drive parameter estimation
#[derive(Debug, Clone, Copy)]
pub struct EstimatorSettings {
    pub min_samples_ratio: f64,
    pub bandwidth_quantile: f64,
    pub bandwidth_sample_ratio: f64,
    pub bandwidth_seed: u64,
}

impl From<&ExperimentConfig> for EstimatorSettings {
    fn from(config: &ExperimentConfig) -> Self {
        Self {
            min_samples_ratio: config.min_samples_ratio,
            bandwidth_quantile: config.bandwidth_quantile,
            bandwidth_sample_ratio: config.bandwidth_sample_ratio,
            bandwidth_seed: config.bandwidth_seed,
        }
    }
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self::from(&ExperimentConfig::default())
    }
}

/// Parameters shared by the clustering algorithms of one trial
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClusterParams {
    /// Neighbourhood radius
    pub eps: f32,
    /// Minimum neighbourhood size of a core point, the point itself included
    pub min_samples: usize,
    /// Mean-shift kernel radius
    pub bandwidth: f32,
    /// Rows used to estimate the bandwidth
    pub bandwidth_samples: usize,
    /// Bandwidth estimate was zero and replaced by the fallback
    pub bandwidth_substituted: bool,
}

/// `round(n_errors * ratio)`, at least 1
pub fn min_samples_for(n_errors: usize, ratio: f64) -> usize {
    round_half_even(n_errors as f64 * ratio).max(1)
}

/// Knee of the sorted `n_errors`-th neighbour distances
///
/// With `n_errors == 0` the 99th-percentile rank is used instead.
pub fn estimate_eps(distances: &DistanceMatrix, n_errors: usize) -> Result<f32> {
    let instances = distances.len();
    let k = n_errors.max(1);

    if instances < 2 || k >= instances {
        return Err(AnalysisError::degenerate(
            Stage::Estimation,
            format!(
                "{} points cannot provide a {}-th nearest neighbour",
                instances, k
            ),
        ));
    }

    let mut kth: Vec<f32> = (0..instances)
        .filter_map(|i| distances.kth_neighbor_distance(i, k))
        .collect();
    kth.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = if n_errors == 0 {
        round_half_even(instances as f64 * 0.99).min(instances - 1)
    } else {
        instances - n_errors - 1
    };

    let eps = kth[rank];
    if !eps.is_finite() || eps <= 0.0 {
        return Err(AnalysisError::degenerate(
            Stage::Estimation,
            format!("neighbour distance at rank {} is {}", rank, eps),
        ));
    }

    Ok(eps)
}

/// Mean distance to the `floor(n_samples * quantile)`-th neighbour (self counted)
/// over a seeded subset of `n_samples` rows
///
/// May return 0 when the chosen rank is the point itself or points coincide.
pub fn estimate_bandwidth(
    distances: &DistanceMatrix,
    n_samples: usize,
    quantile: f64,
    seed: u64,
) -> f32 {
    let instances = distances.len();
    if instances == 0 {
        return 0.0;
    }

    let n_samples = n_samples.clamp(1, instances);
    let mut rng = StdRng::seed_from_u64(seed);
    let subset = rand::seq::index::sample(&mut rng, instances, n_samples).into_vec();

    let k = ((n_samples as f64 * quantile).floor() as usize).clamp(1, n_samples);

    let total: f32 = subset
        .iter()
        .map(|&i| {
            let mut row: Vec<f32> = subset.iter().map(|&j| distances.get(i, j)).collect();
            let (_, kth, _) = row.select_nth_unstable_by(k - 1, |a, b| {
                a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
            });
            *kth
        })
        .sum();

    total / n_samples as f32
}

/// Derive every clustering parameter for one trial
pub fn estimate(
    distances: &DistanceMatrix,
    n_errors: usize,
    mean_class_size: f64,
    settings: &EstimatorSettings,
) -> Result<ClusterParams> {
    let eps = estimate_eps(distances, n_errors)?;
    let min_samples = min_samples_for(n_errors, settings.min_samples_ratio);

    let bandwidth_samples =
        round_half_even(mean_class_size * settings.bandwidth_sample_ratio).clamp(1, distances.len());
    let estimated = estimate_bandwidth(
        distances,
        bandwidth_samples,
        settings.bandwidth_quantile,
        settings.bandwidth_seed,
    );

    let bandwidth_substituted = estimated.is_nan() || estimated <= 0.0;
    let bandwidth = if bandwidth_substituted {
        tracing::warn!(
            estimated,
            fallback = FALLBACK_BANDWIDTH,
            "bandwidth estimate collapsed, using fallback"
        );
        FALLBACK_BANDWIDTH
    } else {
        estimated
    };

    tracing::debug!(eps, min_samples, bandwidth, bandwidth_samples, "estimated parameters");

    Ok(ClusterParams {
        eps,
        min_samples,
        bandwidth,
        bandwidth_samples,
        bandwidth_substituted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aprender::primitives::Matrix;

    fn line(values: &[f32]) -> DistanceMatrix {
        let points = Matrix::from_vec(values.len(), 1, values.to_vec()).unwrap();
        DistanceMatrix::new(&points)
    }

    fn spread(n: usize) -> DistanceMatrix {
        let values: Vec<f32> = (0..n).map(|i| (i * i) as f32 * 0.01).collect();
        line(&values)
    }

    #[test]
    fn test_min_samples_rounding() {
        assert_eq!(min_samples_for(10, 0.8), 8);
        assert_eq!(min_samples_for(1, 0.8), 1);
        assert_eq!(min_samples_for(0, 0.8), 1);
        assert_eq!(min_samples_for(30, 0.8), 24);
    }

    #[test]
    fn test_eps_knee_rank() {
        // Nearest-neighbour distances: 1,1,1,1,1 (bulk) and 10 (outlier)
        let dist = line(&[0.0, 1.0, 2.0, 3.0, 4.0, 14.0]);
        let eps = estimate_eps(&dist, 1).unwrap();
        // rank = 6 - 1 - 1 = 4 -> largest bulk distance
        assert_eq!(eps, 1.0);
    }

    #[test]
    fn test_eps_uses_kth_neighbor() {
        let dist = line(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 30.0]);
        // 2nd neighbour distances sorted: 1,1,1,1,1,2,2,25
        let eps = estimate_eps(&dist, 2).unwrap();
        assert_eq!(eps, 2.0);
    }

    #[test]
    fn test_eps_ignores_nearest_partner_with_several_errors() {
        // Tight pairs 5 apart: every nearest distance is 0.1, every 2nd is about 4.9
        let dist = line(&[0.0, 0.1, 5.0, 5.1, 10.0, 10.1, 15.0, 15.1, 20.0, 20.1]);
        let eps = estimate_eps(&dist, 2).unwrap();
        assert!((eps - 4.9).abs() < 1e-4, "eps {}", eps);

        let nearest = dist.kth_neighbor_distance(0, 1).unwrap();
        assert!((nearest - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_eps_zero_errors_uses_percentile_rank() {
        let dist = spread(101);
        let eps = estimate_eps(&dist, 0).unwrap();

        let mut nn: Vec<f32> = (0..101)
            .map(|i| dist.kth_neighbor_distance(i, 1).unwrap())
            .collect();
        nn.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(eps, nn[100]);
    }

    #[test]
    fn test_eps_degenerate_inputs() {
        assert!(estimate_eps(&line(&[1.0]), 0).is_err());
        assert!(estimate_eps(&line(&[0.0, 1.0, 2.0]), 3).is_err());
        // All points coincide: zero radius
        assert!(estimate_eps(&line(&[2.0, 2.0, 2.0, 2.0]), 1).is_err());
    }

    #[test]
    fn test_bandwidth_mean_of_quantile_neighbor() {
        // Every point has its neighbours at distance 1 on a line of 10
        let values: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let dist = line(&values);
        // k = floor(10 * 0.2) = 2 -> nearest other point, distance 1
        let bw = estimate_bandwidth(&dist, 10, 0.2, 0);
        assert!((bw - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_bandwidth_can_collapse() {
        let dist = line(&[0.0, 1.0, 2.0]);
        // k = max(floor(3 * 0.3), 1) = 1 -> the point itself
        assert_eq!(estimate_bandwidth(&dist, 3, 0.3, 0), 0.0);
    }

    #[test]
    fn test_estimate_substitutes_zero_bandwidth() {
        let dist = line(&[0.0, 1.0, 2.0, 10.0]);
        let settings = EstimatorSettings::default();
        let params = estimate(&dist, 1, 2.0, &settings).unwrap();

        assert!(params.bandwidth_substituted);
        assert_eq!(params.bandwidth, FALLBACK_BANDWIDTH);
        assert_eq!(params.min_samples, 1);
        assert_eq!(params.bandwidth_samples, 2);
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let dist = spread(120);
        let settings = EstimatorSettings::default();
        let first = estimate(&dist, 1, 60.5, &settings).unwrap();
        let second = estimate(&dist, 1, 60.5, &settings).unwrap();
        assert_eq!(first, second);
        assert!(first.bandwidth > 0.0);
        assert!(!first.bandwidth_substituted);
    }
}
