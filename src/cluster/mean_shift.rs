//! Mean shift with a flat kernel and bin seeding

use super::{ClusterAssignment, ClusteringAlgorithm};
use crate::error::{AnalysisError, Result, Stage};
use crate::neighbors::distance_to;
use crate::params::ClusterParams;
use aprender::primitives::Matrix;
use std::collections::HashMap;

/// Mode seeking: every seed climbs to the mean of the points within
/// `bandwidth` until it stops moving; modes closer than `bandwidth` to a
/// denser mode are merged into it, and each point joins its nearest mode.
#[derive(Debug, Clone, Copy)]
pub struct MeanShift {
    max_iter: usize,
}

impl MeanShift {
    pub fn new(max_iter: usize) -> Self {
        Self { max_iter }
    }
}

/// A converged seed
#[derive(Debug, Clone)]
struct Mode {
    center: Vec<f32>,
    intensity: usize,
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn point(points: &Matrix<f32>, i: usize) -> Vec<f32> {
    (0..points.shape().1).map(|k| points.get(i, k)).collect()
}

/// Grid-snapped seeds, one per occupied cell of side `bin_size`
///
/// When every point occupies its own cell the points themselves are used.
pub(crate) fn bin_seeds(points: &Matrix<f32>, bin_size: f32) -> Vec<Vec<f32>> {
    let (n, d) = points.shape();
    let mut cells: Vec<Vec<i64>> = Vec::new();
    let mut seen: HashMap<Vec<i64>, usize> = HashMap::new();

    for i in 0..n {
        let cell: Vec<i64> = (0..d)
            .map(|k| (points.get(i, k) / bin_size).round_ties_even() as i64)
            .collect();
        if !seen.contains_key(&cell) {
            seen.insert(cell.clone(), cells.len());
            cells.push(cell);
        }
    }

    if cells.len() == n {
        return (0..n).map(|i| point(points, i)).collect();
    }

    cells
        .into_iter()
        .map(|cell| cell.into_iter().map(|c| c as f32 * bin_size).collect())
        .collect()
}

impl MeanShift {
    /// Climb from `seed`; `None` if the seed ends with no neighbours
    fn climb(&self, points: &Matrix<f32>, seed: Vec<f32>, bandwidth: f32) -> Option<Mode> {
        let (n, d) = points.shape();
        let stop_threshold = 1e-3 * bandwidth;
        let mut mean = seed;
        let mut iterations = 0;

        loop {
            let members: Vec<usize> = (0..n)
                .filter(|&i| distance_to(points, i, &mean) <= bandwidth)
                .collect();
            if members.is_empty() {
                return None;
            }

            let mut next = vec![0.0f32; d];
            for &i in &members {
                for (k, slot) in next.iter_mut().enumerate() {
                    *slot += points.get(i, k);
                }
            }
            for slot in &mut next {
                *slot /= members.len() as f32;
            }

            let shift = euclidean(&next, &mean);
            mean = next;

            if shift <= stop_threshold || iterations == self.max_iter {
                return Some(Mode {
                    center: mean,
                    intensity: members.len(),
                });
            }
            iterations += 1;
        }
    }
}

impl ClusteringAlgorithm for MeanShift {
    fn name(&self) -> &'static str {
        "Mean Shift"
    }

    fn fit(&self, points: &Matrix<f32>, params: &ClusterParams) -> Result<ClusterAssignment> {
        let bandwidth = params.bandwidth;
        if bandwidth.is_nan() || bandwidth <= 0.0 {
            return Err(AnalysisError::degenerate(
                Stage::Clustering,
                format!("bandwidth must be positive, got {}", bandwidth),
            ));
        }

        let n = points.shape().0;
        if n == 0 {
            return Err(AnalysisError::degenerate(Stage::Clustering, "no points"));
        }

        let mut modes: Vec<Mode> = Vec::new();
        for seed in bin_seeds(points, bandwidth) {
            if let Some(mode) = self.climb(points, seed, bandwidth) {
                if !modes.iter().any(|m| m.center == mode.center) {
                    modes.push(mode);
                }
            }
        }

        if modes.is_empty() {
            return Err(AnalysisError::degenerate(
                Stage::Clustering,
                format!("no seed has neighbours within bandwidth {}", bandwidth),
            ));
        }

        // Densest first, coordinates break ties
        modes.sort_by(|a, b| {
            b.intensity.cmp(&a.intensity).then_with(|| {
                b.center
                    .partial_cmp(&a.center)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        });

        let mut keep = vec![true; modes.len()];
        for i in 0..modes.len() {
            if !keep[i] {
                continue;
            }
            for j in (i + 1)..modes.len() {
                if keep[j] && euclidean(&modes[i].center, &modes[j].center) <= bandwidth {
                    keep[j] = false;
                }
            }
        }
        let centers: Vec<&[f32]> = modes
            .iter()
            .zip(&keep)
            .filter(|(_, &k)| k)
            .map(|(m, _)| m.center.as_slice())
            .collect();

        tracing::trace!(seeds = modes.len(), modes = centers.len(), "mean shift converged");

        let labels = (0..n)
            .map(|i| {
                let mut best = 0;
                let mut best_distance = f32::INFINITY;
                for (c, center) in centers.iter().enumerate() {
                    let d = distance_to(points, i, center);
                    if d < best_distance {
                        best = c;
                        best_distance = d;
                    }
                }
                best as i32
            })
            .collect();

        Ok(ClusterAssignment::new(labels))
    }
}
