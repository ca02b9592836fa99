//! OPTICS with DBSCAN-style cluster extraction
//!
//! The reachability ordering is built once with `max_eps = eps * scale`,
//! then clusters are cut from it at `max_eps`: a point that is not
//! reachable within the radius opens a new cluster if it is itself a core
//! point, and is noise otherwise.

use super::{ClusterAssignment, ClusteringAlgorithm, NOISE};
use crate::error::Result;
use crate::neighbors::DistanceMatrix;
use crate::params::ClusterParams;
use aprender::primitives::Matrix;

/// Reachability ordering of a point set
#[derive(Debug, Clone)]
pub struct ReachabilityPlot {
    /// Visit order
    pub ordering: Vec<usize>,
    /// Reachability distance per point (indexed by point, not by visit)
    pub reachability: Vec<f32>,
    /// Core distance per point, infinite when beyond `max_eps`
    pub core_distances: Vec<f32>,
}

impl ReachabilityPlot {
    /// Build the ordering; `min_samples` counts the point itself
    pub fn build(distances: &DistanceMatrix, min_samples: usize, max_eps: f32) -> Self {
        let n = distances.len();

        let core_distances: Vec<f32> = (0..n)
            .map(|i| match distances.kth_distance_with_self(i, min_samples.max(1)) {
                Some(d) if d <= max_eps => d,
                _ => f32::INFINITY,
            })
            .collect();

        let mut reachability = vec![f32::INFINITY; n];
        let mut processed = vec![false; n];
        let mut ordering = Vec::with_capacity(n);

        for _ in 0..n {
            // Smallest reachability first, lowest index on ties
            let Some(point) = (0..n).filter(|&i| !processed[i]).min_by(|&a, &b| {
                reachability[a]
                    .partial_cmp(&reachability[b])
                    .unwrap_or(std::cmp::Ordering::Equal)
            }) else {
                break;
            };

            processed[point] = true;
            ordering.push(point);

            let core = core_distances[point];
            if !core.is_finite() {
                continue;
            }

            for other in 0..n {
                if processed[other] {
                    continue;
                }
                let d = distances.get(point, other);
                if d <= max_eps {
                    let reach = core.max(d);
                    if reach < reachability[other] {
                        reachability[other] = reach;
                    }
                }
            }
        }

        Self {
            ordering,
            reachability,
            core_distances,
        }
    }

    /// Cut flat clusters at radius `eps`
    pub fn extract_dbscan(&self, eps: f32) -> Vec<i32> {
        let mut labels = vec![NOISE; self.reachability.len()];
        let mut cluster: i32 = -1;

        for &point in &self.ordering {
            let far_reach = self.reachability[point] > eps;
            let near_core = self.core_distances[point] <= eps;

            if far_reach && near_core {
                cluster += 1;
            }

            labels[point] = if far_reach && !near_core {
                NOISE
            } else {
                cluster
            };
        }

        labels
    }
}

/// Density clustering with automatic cluster count
#[derive(Debug, Clone, Copy)]
pub struct Optics {
    eps_scale: f32,
}

impl Optics {
    pub fn new(eps_scale: f32) -> Self {
        Self { eps_scale }
    }
}

impl ClusteringAlgorithm for Optics {
    fn name(&self) -> &'static str {
        "OPTICS"
    }

    fn fit(&self, points: &Matrix<f32>, params: &ClusterParams) -> Result<ClusterAssignment> {
        let max_eps = params.eps * self.eps_scale;
        let distances = DistanceMatrix::new(points);
        let plot = ReachabilityPlot::build(&distances, params.min_samples, max_eps);

        Ok(ClusterAssignment::new(plot.extract_dbscan(max_eps)))
    }
}
