//! Trial sampler: imbalanced baseline/target subsamples
//!
//! Every trial keeps all baseline traces and injects a small random set of
//! target traces, about one per hundred baseline traces and never more than
//! the noise cap, mimicking a realistic rate of faulty executions.

use crate::dataset::{TraceDataset, TraceMatrix};
use crate::error::{AnalysisError, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

/// Binary role of a trace inside one trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinaryLabel {
    Baseline,
    Target,
}

impl BinaryLabel {
    pub fn as_index(self) -> usize {
        match self {
            BinaryLabel::Baseline => 0,
            BinaryLabel::Target => 1,
        }
    }
}

/// A (baseline, target) comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgramPair {
    pub baseline: u32,
    pub target: u32,
}

impl ProgramPair {
    pub fn classify(&self, label: u32) -> Option<BinaryLabel> {
        if label == self.baseline {
            Some(BinaryLabel::Baseline)
        } else if label == self.target {
            Some(BinaryLabel::Target)
        } else {
            None
        }
    }
}

/// Round half to even, the rounding used for every derived count
pub fn round_half_even(x: f64) -> usize {
    x.round_ties_even().max(0.0) as usize
}

/// Rows drawn for one trial
#[derive(Debug, Clone)]
pub struct TrialSample {
    /// Dataset row indices: baseline rows ascending, then drawn target rows
    pub indices: Vec<usize>,
    /// Features of the selected rows, in `indices` order
    pub features: TraceMatrix,
    /// Binary labels aligned with `indices`
    pub labels: Vec<BinaryLabel>,
    /// `round(minority_rate * baseline_row_count)` before capping
    pub n_errors: usize,
    pub baseline_count: usize,
    pub target_count: usize,
}

impl TrialSample {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Mean number of rows per class present in the trial
    pub fn mean_class_size(&self) -> f64 {
        let counts: Vec<usize> = [self.baseline_count, self.target_count]
            .into_iter()
            .filter(|&c| c > 0)
            .collect();
        if counts.is_empty() {
            return 0.0;
        }
        counts.iter().sum::<usize>() as f64 / counts.len() as f64
    }
}

/// Builds trial samples for one program pair
#[derive(Debug, Clone)]
pub struct TrialSampler {
    pair: ProgramPair,
    baseline_rows: Vec<usize>,
    draw_space: Option<(usize, usize)>,
    n_errors: usize,
    target_quota: usize,
}

impl TrialSampler {
    /// Prepare a sampler; `minority_rate` and `noise_cap` size the target draw
    pub fn new(
        dataset: &TraceDataset,
        pair: ProgramPair,
        minority_rate: f64,
        noise_cap: usize,
    ) -> Result<Self> {
        let baseline_rows = dataset.rows_with_label(pair.baseline);
        if baseline_rows.is_empty() {
            return Err(AnalysisError::degenerate(
                crate::error::Stage::Sampling,
                format!("baseline label {} has no traces", pair.baseline),
            ));
        }

        let n_errors = round_half_even(minority_rate * baseline_rows.len() as f64);
        Ok(Self {
            pair,
            draw_space: dataset.label_span(pair.target),
            target_quota: n_errors.min(noise_cap),
            n_errors,
            baseline_rows,
        })
    }

    pub fn pair(&self) -> ProgramPair {
        self.pair
    }

    pub fn n_errors(&self) -> usize {
        self.n_errors
    }

    /// Target rows each trial tries to include
    pub fn target_quota(&self) -> usize {
        self.target_quota
    }

    /// Draw one randomized trial sample
    pub fn draw<R: Rng + ?Sized>(&self, dataset: &TraceDataset, rng: &mut R) -> Result<TrialSample> {
        let mut indices = self.baseline_rows.clone();
        let labels = dataset.labels();

        if let Some((first, last)) = self.draw_space {
            let mut candidates: Vec<usize> = (first..=last).collect();
            candidates.shuffle(rng);

            let mut included = 0;
            for row in candidates {
                if included == self.target_quota {
                    break;
                }
                if labels[row] == self.pair.target {
                    indices.push(row);
                    included += 1;
                }
            }

            if included < self.target_quota {
                tracing::debug!(
                    target_label = self.pair.target,
                    included,
                    quota = self.target_quota,
                    "target draw space exhausted"
                );
            }
        }

        let sample_labels: Vec<u32> = indices.iter().map(|&i| labels[i]).collect();
        let binary = remap_labels(&sample_labels, &indices, self.pair)?;
        let target_count = binary.iter().filter(|&&l| l == BinaryLabel::Target).count();

        Ok(TrialSample {
            features: dataset.traces().select_rows(&indices),
            baseline_count: binary.len() - target_count,
            target_count,
            labels: binary,
            n_errors: self.n_errors,
            indices,
        })
    }
}

/// Map original labels onto the binary baseline/target scheme
///
/// `rows` gives the dataset row of each label and is only used to report
/// integrity violations.
pub fn remap_labels(labels: &[u32], rows: &[usize], pair: ProgramPair) -> Result<Vec<BinaryLabel>> {
    labels
        .iter()
        .zip(rows)
        .map(|(&label, &row)| {
            pair.classify(label).ok_or(AnalysisError::DataIntegrity {
                row,
                label,
                baseline: pair.baseline,
                target: pair.target,
            })
        })
        .collect()
}
