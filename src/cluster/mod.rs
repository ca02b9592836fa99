// Clustering engine: three interchangeable unsupervised algorithms
//
// Every algorithm consumes the reduced points of one trial plus the
// parameters estimated for it and returns one label per point. Label -1
// marks noise for the density-based variants; mean shift assigns every
// point to a mode.
//
// - Optics: reachability ordering, clusters extracted at eps * scale
// - Dbscan: fixed-radius density connectivity (aprender's DBSCAN)
// - MeanShift: flat-kernel mode seeking with bin seeding

mod dbscan;
mod mean_shift;
mod optics;

pub use dbscan::Dbscan;
pub use mean_shift::MeanShift;
pub use optics::{Optics, ReachabilityPlot};

use crate::config::{AlgorithmKind, ExperimentConfig};
use crate::error::Result;
use crate::params::ClusterParams;
use aprender::primitives::Matrix;
use std::collections::BTreeSet;

/// Label reserved for points outside every cluster
pub const NOISE: i32 = -1;

/// One cluster id per point, `NOISE` for rejected points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAssignment {
    pub labels: Vec<i32>,
}

impl ClusterAssignment {
    pub fn new(labels: Vec<i32>) -> Self {
        Self { labels }
    }

    /// Number of distinct non-noise labels
    pub fn cluster_count(&self) -> usize {
        self.labels
            .iter()
            .filter(|&&l| l != NOISE)
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn noise_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == NOISE).count()
    }

    /// Number of distinct labels, noise included
    pub fn distinct_labels(&self) -> usize {
        self.labels.iter().collect::<BTreeSet<_>>().len()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Capability shared by every clustering algorithm
pub trait ClusteringAlgorithm {
    fn name(&self) -> &'static str;

    fn fit(&self, points: &Matrix<f32>, params: &ClusterParams) -> Result<ClusterAssignment>;
}

impl AlgorithmKind {
    /// Instantiate the algorithm with the configured tuning
    pub fn build(self, config: &ExperimentConfig) -> Box<dyn ClusteringAlgorithm> {
        match self {
            AlgorithmKind::Optics => Box::new(Optics::new(config.optics_eps_scale)),
            AlgorithmKind::Dbscan => Box::new(Dbscan),
            AlgorithmKind::MeanShift => Box::new(MeanShift::new(config.mean_shift_max_iter)),
        }
    }
}
