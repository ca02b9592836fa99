use super::{ClusterAssignment, ClusteringAlgorithm};
use crate::error::{AnalysisError, Result, Stage};
use crate::params::ClusterParams;
use aprender::cluster::DBSCAN;
use aprender::primitives::Matrix;
use aprender::traits::UnsupervisedEstimator;

/// Fixed-radius density clustering
///
/// Points with at least `min_samples` neighbours within `eps` (themselves
/// included) are core points; clusters are their connected components plus
/// reachable border points. Everything else is noise.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dbscan;

impl ClusteringAlgorithm for Dbscan {
    fn name(&self) -> &'static str {
        "DBSCAN"
    }

    fn fit(&self, points: &Matrix<f32>, params: &ClusterParams) -> Result<ClusterAssignment> {
        let mut dbscan = DBSCAN::new(params.eps, params.min_samples);

        dbscan
            .fit(points)
            .map_err(|e| AnalysisError::degenerate(Stage::Clustering, e.to_string()))?;

        Ok(ClusterAssignment::new(dbscan.labels().clone()))
    }
}
