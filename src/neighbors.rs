//! Euclidean distances between reduced points

use aprender::primitives::Matrix;

/// Euclidean distance between rows `i` and `j` of `points`
pub fn row_distance(points: &Matrix<f32>, i: usize, j: usize) -> f32 {
    let n_features = points.shape().1;
    (0..n_features)
        .map(|k| {
            let d = points.get(i, k) - points.get(j, k);
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

/// Euclidean distance between row `i` of `points` and an arbitrary point
pub fn distance_to(points: &Matrix<f32>, i: usize, point: &[f32]) -> f32 {
    point
        .iter()
        .enumerate()
        .map(|(k, &v)| {
            let d = points.get(i, k) - v;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

/// Dense symmetric matrix of pairwise distances
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    n: usize,
    data: Vec<f32>,
}

impl DistanceMatrix {
    pub fn new(points: &Matrix<f32>) -> Self {
        let n = points.shape().0;
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = row_distance(points, i, j);
                data[i * n + j] = d;
                data[j * n + i] = d;
            }
        }
        Self { n, data }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.data[i * self.n + j]
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// Distance from `i` to its k-th nearest neighbour, the point itself counted first
    ///
    /// `k = 1` is always 0. Returns `None` when `k` is 0 or exceeds the point count.
    pub fn kth_distance_with_self(&self, i: usize, k: usize) -> Option<f32> {
        if k == 0 || k > self.n {
            return None;
        }
        let mut row = self.row(i).to_vec();
        let (_, kth, _) = row.select_nth_unstable_by(k - 1, |a, b| {
            a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
        });
        Some(*kth)
    }

    /// Distance from `i` to its k-th nearest other point
    pub fn kth_neighbor_distance(&self, i: usize, k: usize) -> Option<f32> {
        if k == 0 {
            return None;
        }
        self.kth_distance_with_self(i, k + 1)
    }
}
