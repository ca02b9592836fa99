//! Feature reducer: per-trial standardization and principal components
//!
//! Both the scaler and the projection are fit on the trial sample alone, so
//! no statistics leak between trials. Traces are usually far wider than a
//! trial is tall (tens of thousands of samples against a few hundred rows);
//! in that regime the projection is computed from the trial's Gram matrix
//! instead of the feature covariance.

use crate::dataset::TraceMatrix;
use crate::error::{AnalysisError, Result, Stage};
use aprender::preprocessing::{StandardScaler, PCA};
use aprender::primitives::Matrix;
use aprender::traits::Transformer;
use nalgebra::{DMatrix, SymmetricEigen};

/// Standardized trial features
#[derive(Debug, Clone)]
pub struct StandardizedFeatures {
    /// Feature matrix (n_samples x n_features), zero mean and unit variance per column
    pub data: Matrix<f32>,
    /// Mean values used for standardization
    pub means: Vec<f32>,
    /// Standard deviations used for standardization
    pub stds: Vec<f32>,
}

/// Trial sample projected onto its leading principal components
#[derive(Debug, Clone)]
pub struct ReducedSample {
    /// Projected points (n_samples x components)
    pub points: Matrix<f32>,
    /// Explained variance ratio per component
    pub explained_variance_ratio: Vec<f32>,
}

impl ReducedSample {
    pub fn shape(&self) -> (usize, usize) {
        self.points.shape()
    }

    pub fn total_variance_explained(&self) -> f32 {
        self.explained_variance_ratio.iter().sum()
    }
}

/// Fit a standardization on `features` and apply it
pub fn standardize(features: &TraceMatrix) -> Result<StandardizedFeatures> {
    let matrix = features
        .to_matrix()
        .map_err(|e| AnalysisError::degenerate(Stage::Reduction, e.to_string()))?;

    let mut scaler = StandardScaler::new().with_mean(true).with_std(true);

    scaler
        .fit(&matrix)
        .map_err(|e| AnalysisError::degenerate(Stage::Reduction, e.to_string()))?;

    let data = scaler
        .transform(&matrix)
        .map_err(|e| AnalysisError::degenerate(Stage::Reduction, e.to_string()))?;

    Ok(StandardizedFeatures {
        data,
        means: scaler.mean().to_vec(),
        stds: scaler.std().to_vec(),
    })
}

/// Standardize then project onto `components` principal axes
pub fn reduce(features: &TraceMatrix, components: usize) -> Result<ReducedSample> {
    let (n_samples, n_features) = features.shape();

    if components == 0 {
        return Err(AnalysisError::degenerate(
            Stage::Reduction,
            "component count must be >= 1",
        ));
    }

    if components > n_samples.min(n_features) {
        return Err(AnalysisError::degenerate(
            Stage::Reduction,
            format!(
                "{} components requested from a {}x{} sample",
                components, n_samples, n_features
            ),
        ));
    }

    let distinct = features.distinct_rows();
    if distinct < components {
        return Err(AnalysisError::degenerate(
            Stage::Reduction,
            format!(
                "{} distinct points cannot span {} components",
                distinct, components
            ),
        ));
    }

    let standardized = standardize(features)?;

    if n_features <= n_samples {
        covariance_projection(&standardized.data, components)
    } else {
        gram_projection(&standardized.data, components)
    }
}

fn covariance_projection(data: &Matrix<f32>, components: usize) -> Result<ReducedSample> {
    let mut pca = PCA::new(components);

    let points = pca
        .fit_transform(data)
        .map_err(|e| AnalysisError::degenerate(Stage::Reduction, e.to_string()))?;

    let explained_variance_ratio = pca
        .explained_variance_ratio()
        .map(|v| v.to_vec())
        .unwrap_or_default();

    Ok(ReducedSample {
        points,
        explained_variance_ratio,
    })
}

/// PCA scores from the eigenvectors of `X Xᵀ`
///
/// For centred `X` with `X Xᵀ u = λ u`, the score of each row on the
/// matching principal axis is `sqrt(λ) u`.
fn gram_projection(data: &Matrix<f32>, components: usize) -> Result<ReducedSample> {
    let (n_samples, n_features) = data.shape();

    let widened: Vec<f64> = data.as_slice().iter().map(|&v| f64::from(v)).collect();
    let x = DMatrix::from_row_slice(n_samples, n_features, &widened);
    let gram = &x * x.transpose();

    let eigen = SymmetricEigen::new(gram);
    let eigenvalues = eigen.eigenvalues;
    let eigenvectors = eigen.eigenvectors;

    let mut order: Vec<usize> = (0..n_samples).collect();
    order.sort_by(|&a, &b| {
        eigenvalues[b]
            .partial_cmp(&eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let total: f64 = eigenvalues.iter().map(|v| v.max(0.0)).sum();
    if total <= 0.0 {
        return Err(AnalysisError::degenerate(
            Stage::Reduction,
            "trial sample has zero variance",
        ));
    }

    let mut scores = vec![0.0f32; n_samples * components];
    let mut explained_variance_ratio = Vec::with_capacity(components);

    for (c, &idx) in order.iter().take(components).enumerate() {
        let lambda = eigenvalues[idx].max(0.0);
        let scale = lambda.sqrt();
        for i in 0..n_samples {
            scores[i * components + c] = (eigenvectors[(i, idx)] * scale) as f32;
        }
        explained_variance_ratio.push((lambda / total) as f32);
    }

    let points = Matrix::from_vec(n_samples, components, scores)
        .map_err(|e| AnalysisError::degenerate(Stage::Reduction, e.to_string()))?;

    Ok(ReducedSample {
        points,
        explained_variance_ratio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_traces(rows: usize, cols: usize, seed: u64) -> TraceMatrix {
        let mut rng = StdRng::seed_from_u64(seed);
        let data: Vec<Vec<f32>> = (0..rows)
            .map(|_| (0..cols).map(|_| rng.gen_range(-5.0..5.0)).collect())
            .collect();
        TraceMatrix::from_rows(&data).unwrap()
    }

    fn column_stats(data: &Matrix<f32>, j: usize) -> (f32, f32) {
        let (n, _) = data.shape();
        let mean = (0..n).map(|i| data.get(i, j)).sum::<f32>() / n as f32;
        let var = (0..n).map(|i| (data.get(i, j) - mean).powi(2)).sum::<f32>() / n as f32;
        (mean, var)
    }

    #[test]
    fn test_standardize_zero_mean_unit_variance() {
        let traces = random_traces(40, 6, 1);
        let standardized = standardize(&traces).unwrap();

        assert_eq!(standardized.means.len(), 6);
        assert_eq!(standardized.stds.len(), 6);
        for j in 0..6 {
            let (mean, var) = column_stats(&standardized.data, j);
            assert!(mean.abs() < 1e-4, "column {} mean {}", j, mean);
            assert!((var - 1.0).abs() < 1e-3, "column {} variance {}", j, var);
        }
    }

    #[test]
    fn test_reduce_shape_narrow() {
        let traces = random_traces(101, 16, 2);
        let reduced = reduce(&traces, 8).unwrap();

        assert_eq!(reduced.shape(), (101, 8));
        assert_eq!(reduced.explained_variance_ratio.len(), 8);
        assert!(reduced.total_variance_explained() <= 1.01);
    }

    #[test]
    fn test_reduce_shape_wide() {
        let traces = random_traces(20, 64, 3);
        let reduced = reduce(&traces, 10).unwrap();

        assert_eq!(reduced.shape(), (20, 10));
        let ratios = &reduced.explained_variance_ratio;
        for pair in ratios.windows(2) {
            assert!(pair[0] + 1e-6 >= pair[1], "ratios not descending: {:?}", ratios);
        }
        assert!(reduced.total_variance_explained() <= 1.01);
    }

    #[test]
    fn test_wide_projection_preserves_variance() {
        // Variance of the scores on a component equals its eigenvalue / n
        let traces = random_traces(15, 40, 4);
        let standardized = standardize(&traces).unwrap();
        let reduced = reduce(&traces, 3).unwrap();

        let total_var: f32 = (0..40).map(|j| column_stats(&standardized.data, j).1).sum();
        let (_, first_var) = column_stats(&reduced.points, 0);
        let expected = reduced.explained_variance_ratio[0] * total_var;
        assert!(
            (first_var - expected).abs() < 1e-2 * expected.max(1.0),
            "first component variance {} vs {}",
            first_var,
            expected
        );
    }

    #[test]
    fn test_gram_projection_matches_covariance_projection() {
        let traces = random_traces(24, 6, 9);
        let standardized = standardize(&traces).unwrap();
        let gram = gram_projection(&standardized.data, 2).unwrap();
        let covariance = covariance_projection(&standardized.data, 2).unwrap();

        for c in 0..2 {
            assert!(
                (gram.explained_variance_ratio[c] - covariance.explained_variance_ratio[c]).abs()
                    < 1e-3
            );
            // Axes agree up to sign
            for i in 0..24 {
                let (g, p) = (gram.points.get(i, c), covariance.points.get(i, c));
                assert!((g.abs() - p.abs()).abs() < 1e-2, "row {} component {}", i, c);
            }
        }
    }

    #[test]
    fn test_wide_projection_separates_groups() {
        let mut rows = Vec::new();
        for i in 0..10 {
            let offset = if i < 5 { 0.0 } else { 10.0 };
            rows.push((0..50).map(|j| offset + ((i * 7 + j) % 5) as f32 * 0.1).collect());
        }
        let traces = TraceMatrix::from_rows(&rows).unwrap();
        let reduced = reduce(&traces, 2).unwrap();

        let first: Vec<f32> = (0..10).map(|i| reduced.points.get(i, 0)).collect();
        let sign = first[0].signum();
        assert!(first[..5].iter().all(|v| v.signum() == sign));
        assert!(first[5..].iter().all(|v| v.signum() == -sign));
    }

    #[test]
    fn test_too_many_components() {
        let traces = random_traces(5, 20, 5);
        let err = reduce(&traces, 8).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::DegenerateInput {
                stage: Stage::Reduction,
                ..
            }
        ));
    }

    #[test]
    fn test_too_few_distinct_points() {
        let rows = vec![vec![1.0, 2.0, 3.0, 4.0]; 12];
        let mut rows = rows;
        rows[0] = vec![0.0, 0.0, 0.0, 0.0];
        let traces = TraceMatrix::from_rows(&rows).unwrap();
        let err = reduce(&traces, 3).unwrap_err();
        assert!(err.to_string().contains("distinct"));
    }

    #[test]
    fn test_zero_components() {
        let traces = random_traces(10, 4, 6);
        assert!(reduce(&traces, 0).is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_standardization_round_trip(rows in 3usize..30, cols in 1usize..8, seed in 0u64..500) {
            let traces = random_traces(rows, cols, seed);
            let standardized = standardize(&traces).unwrap();
            for j in 0..cols {
                let (mean, var) = column_stats(&standardized.data, j);
                proptest::prop_assert!(mean.abs() < 1e-3);
                proptest::prop_assert!((var - 1.0).abs() < 1e-2);
            }
        }
    }
}
