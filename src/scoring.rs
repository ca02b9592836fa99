//! Scorer: cluster quality and detection power of one assignment
//!
//! Three measures per trial:
//! - silhouette of the assignment in the reduced space (noise is scored as
//!   one more label),
//! - normalized mutual information against the true baseline/target split,
//! - ROC AUC of the cluster label used as a detection score, only when the
//!   algorithm found exactly two clusters. Noise counts as the target side.
//!
//! A metric whose precondition does not hold is reported as unavailable
//! for the trial instead of failing it.

use crate::cluster::{ClusterAssignment, NOISE};
use crate::error::{AnalysisError, Result, Stage};
use crate::neighbors::DistanceMatrix;
use crate::sampler::BinaryLabel;
use aprender::primitives::Matrix;
use serde::Serialize;
use std::collections::BTreeMap;

/// Scalar results of one algorithm on one trial
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialMetrics {
    pub cluster_count: usize,
    pub noise_count: usize,
    /// `None` when the assignment has fewer than 2 labels or one label per point
    pub silhouette: Option<f32>,
    pub mutual_information: f32,
    /// Present only for two-cluster assignments with both classes in the trial
    pub auc: Option<f32>,
}

/// Mean silhouette coefficient over all points
///
/// Every distinct label, noise included, is a group. A point alone in its
/// group scores 0. Requires `2 <= distinct labels <= n - 1`.
pub fn silhouette(points: &Matrix<f32>, labels: &[i32]) -> Result<f32> {
    let n = labels.len();
    let mut dense: BTreeMap<i32, usize> = BTreeMap::new();
    for &label in labels {
        let next = dense.len();
        dense.entry(label).or_insert(next);
    }

    let distinct = dense.len();
    if distinct < 2 || distinct + 1 > n || points.shape().0 != n {
        return Err(AnalysisError::MetricPrecondition {
            metric: "silhouette",
            reason: format!("{} distinct labels over {} points", distinct, n),
        });
    }

    let groups: Vec<usize> = labels.iter().map(|l| dense[l]).collect();
    let mut sizes = vec![0usize; distinct];
    for &g in &groups {
        sizes[g] += 1;
    }

    let distances = DistanceMatrix::new(points);
    let mut total = 0.0f64;
    let mut sums = vec![0.0f64; distinct];

    for (i, &own) in groups.iter().enumerate() {
        if sizes[own] == 1 {
            continue;
        }

        sums.iter_mut().for_each(|s| *s = 0.0);
        for (j, &d) in distances.row(i).iter().enumerate() {
            sums[groups[j]] += f64::from(d);
        }

        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = sums
            .iter()
            .zip(&sizes)
            .enumerate()
            .filter(|&(g, _)| g != own)
            .map(|(_, (&sum, &size))| sum / size as f64)
            .fold(f64::INFINITY, f64::min);

        let spread = a.max(b);
        if spread > 0.0 {
            total += (b - a) / spread;
        }
    }

    Ok(((total / n as f64) as f32).clamp(-1.0, 1.0))
}

fn entropy(counts: impl Iterator<Item = usize>, n: f64) -> f64 {
    counts
        .filter(|&c| c > 0)
        .map(|c| {
            let p = c as f64 / n;
            -p * p.ln()
        })
        .sum()
}

/// Mutual information between two partitions, normalized by the
/// arithmetic mean of their entropies
///
/// Two single-class partitions agree perfectly (1.0); independent
/// partitions score 0.0.
pub fn normalized_mutual_information<A, B>(truth: &[A], predicted: &[B]) -> f64
where
    A: Ord + Copy,
    B: Ord + Copy,
{
    let n = truth.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }

    let mut joint: BTreeMap<(A, B), usize> = BTreeMap::new();
    let mut rows: BTreeMap<A, usize> = BTreeMap::new();
    let mut cols: BTreeMap<B, usize> = BTreeMap::new();
    for (&a, &b) in truth.iter().zip(predicted) {
        *joint.entry((a, b)).or_insert(0) += 1;
        *rows.entry(a).or_insert(0) += 1;
        *cols.entry(b).or_insert(0) += 1;
    }

    if rows.len() == 1 && cols.len() == 1 {
        return 1.0;
    }

    let total = n as f64;
    let mutual: f64 = joint
        .iter()
        .map(|((a, b), &count)| {
            let nij = count as f64;
            let expected = (rows[a] as f64) * (cols[b] as f64);
            (nij / total) * (total * nij / expected).ln()
        })
        .sum();

    if mutual <= 0.0 {
        return 0.0;
    }

    let h_truth = entropy(rows.values().copied(), total);
    let h_pred = entropy(cols.values().copied(), total);
    let normalizer = ((h_truth + h_pred) / 2.0).max(f64::EPSILON);

    (mutual / normalizer).clamp(0.0, 1.0)
}

/// Area under the ROC curve of `scores` against binary `truth` (1 = positive)
///
/// Rank-based: the probability that a random positive outranks a random
/// negative, ties counting one half.
pub fn roc_auc(truth: &[usize], scores: &[f64]) -> Result<f64> {
    if truth.len() != scores.len() {
        return Err(AnalysisError::MetricPrecondition {
            metric: "AUC",
            reason: format!("{} labels but {} scores", truth.len(), scores.len()),
        });
    }

    let positives = truth.iter().filter(|&&t| t == 1).count();
    let negatives = truth.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(AnalysisError::MetricPrecondition {
            metric: "AUC",
            reason: "only one true class present".to_string(),
        });
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Average 1-based ranks over tied runs
    let mut ranks = vec![0.0f64; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }

    let positive_rank_sum: f64 = truth
        .iter()
        .zip(&ranks)
        .filter(|(&t, _)| t == 1)
        .map(|(_, &r)| r)
        .sum();
    let p = positives as f64;
    let u = positive_rank_sum - p * (p + 1.0) / 2.0;

    Ok(u / (p * negatives as f64))
}

/// Cluster labels as detection scores, noise folded into label 1
pub fn detection_scores(labels: &[i32]) -> Vec<f64> {
    labels
        .iter()
        .map(|&l| if l == NOISE { 1.0 } else { f64::from(l) })
        .collect()
}

/// Score one assignment against the trial's true labels
pub fn score(
    points: &Matrix<f32>,
    truth: &[BinaryLabel],
    assignment: &ClusterAssignment,
) -> Result<TrialMetrics> {
    if truth.len() != assignment.len() || points.shape().0 != assignment.len() {
        return Err(AnalysisError::degenerate(
            Stage::Scoring,
            format!(
                "{} points, {} true labels, {} cluster labels",
                points.shape().0,
                truth.len(),
                assignment.len()
            ),
        ));
    }

    let truth: Vec<usize> = truth.iter().map(|l| l.as_index()).collect();
    let cluster_count = assignment.cluster_count();

    let silhouette = match silhouette(points, &assignment.labels) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::debug!(error = %e, "silhouette unavailable");
            None
        }
    };

    let mutual_information = normalized_mutual_information(&truth, &assignment.labels) as f32;

    let auc = if cluster_count == 2 {
        match roc_auc(&truth, &detection_scores(&assignment.labels)) {
            Ok(a) => Some(a as f32),
            Err(e) => {
                tracing::debug!(error = %e, "AUC unavailable");
                None
            }
        }
    } else {
        None
    };

    Ok(TrialMetrics {
        cluster_count,
        noise_count: assignment.noise_count(),
        silhouette,
        mutual_information,
        auc,
    })
}
