//! Labeled trace datasets
//!
//! A dataset is one headerless comma-delimited file: each row holds the
//! samples of one trace followed by a trailing program label. Labels 0 and 1
//! are the reserved baselines, every other label is a target program.

use crate::error::{AnalysisError, Result};
use aprender::primitives::Matrix;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// Labels reserved for baseline captures
pub const BASELINE_LABELS: [u32; 2] = [0, 1];

/// Dense row-major trace matrix (rows = traces, columns = sample points)
#[derive(Debug, Clone, PartialEq)]
pub struct TraceMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl TraceMatrix {
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(AnalysisError::MalformedDataset {
                line: 0,
                message: format!(
                    "{} values cannot fill a {}x{} matrix",
                    data.len(),
                    rows,
                    cols
                ),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from equal-length rows
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(AnalysisError::MalformedDataset {
                    line: i as u64 + 1,
                    message: format!("expected {} samples, found {}", cols, row.len()),
                });
            }
            data.extend_from_slice(row);
        }
        Self::new(rows.len(), cols, data)
    }

    pub fn n_rows(&self) -> usize {
        self.rows
    }

    pub fn n_cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        (0..self.rows).map(move |i| self.row(i))
    }

    /// Copy the given rows, in the given order, into a new matrix
    pub fn select_rows(&self, indices: &[usize]) -> TraceMatrix {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        TraceMatrix {
            rows: indices.len(),
            cols: self.cols,
            data,
        }
    }

    /// Number of pairwise-distinct rows
    ///
    /// Rows are compared bit for bit through a sorted index, without copying them.
    pub fn distinct_rows(&self) -> usize {
        let bits = |i: usize| self.row(i).iter().map(|v| v.to_bits());

        let mut order: Vec<usize> = (0..self.rows).collect();
        order.sort_unstable_by(|&a, &b| bits(a).cmp(bits(b)));
        order.dedup_by(|a, b| bits(*a).eq(bits(*b)));
        order.len()
    }

    pub fn to_matrix(&self) -> Result<Matrix<f32>> {
        Matrix::from_vec(self.rows, self.cols, self.data.clone()).map_err(|e| {
            AnalysisError::MalformedDataset {
                line: 0,
                message: e.to_string(),
            }
        })
    }
}

/// Trace matrix plus one label per row
#[derive(Debug, Clone)]
pub struct TraceDataset {
    traces: TraceMatrix,
    labels: Vec<u32>,
}

impl TraceDataset {
    pub fn new(traces: TraceMatrix, labels: Vec<u32>) -> Result<Self> {
        if traces.n_rows() != labels.len() {
            return Err(AnalysisError::ShapeMismatch {
                rows: traces.n_rows(),
                labels: labels.len(),
            });
        }
        Ok(Self { traces, labels })
    }

    pub fn traces(&self) -> &TraceMatrix {
        &self.traces
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Row count per label, ascending by label
    pub fn label_counts(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        for &label in &self.labels {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }

    pub fn count_of(&self, label: u32) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }

    pub fn rows_with_label(&self, label: u32) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == label)
            .map(|(i, _)| i)
            .collect()
    }

    /// Inclusive row range spanning every row carrying `label`
    pub fn label_span(&self, label: u32) -> Option<(usize, usize)> {
        let first = self.labels.iter().position(|&l| l == label)?;
        let last = self.labels.iter().rposition(|&l| l == label)?;
        Some((first, last))
    }

    /// Non-baseline labels, ascending
    pub fn target_labels(&self) -> Vec<u32> {
        self.label_counts()
            .into_keys()
            .filter(|l| !BASELINE_LABELS.contains(l))
            .collect()
    }
}

/// Load a labeled dataset from disk
pub fn load_dataset(path: &Path) -> Result<TraceDataset> {
    let file = std::fs::File::open(path).map_err(|e| AnalysisError::Dataset {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let dataset = parse_dataset(std::io::BufReader::new(file))?;
    tracing::info!(
        path = %path.display(),
        traces = dataset.len(),
        samples = dataset.traces().n_cols(),
        "loaded dataset"
    );
    Ok(dataset)
}

/// Parse rows of `samples..., label` from any reader
pub fn parse_dataset<R: Read>(reader: R) -> Result<TraceDataset> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut data = Vec::new();
    let mut labels = Vec::new();
    let mut n_samples: Option<usize> = None;

    for (i, record) in csv_reader.records().enumerate() {
        let fallback_line = i as u64 + 1;
        let record = record.map_err(|e| AnalysisError::MalformedDataset {
            line: e.position().map_or(fallback_line, |p| p.line()),
            message: e.to_string(),
        })?;
        let line = record.position().map_or(fallback_line, |p| p.line());

        if record.len() < 2 {
            return Err(AnalysisError::MalformedDataset {
                line,
                message: "row needs at least one sample and a label".into(),
            });
        }

        let samples = record.len() - 1;
        match n_samples {
            None => n_samples = Some(samples),
            Some(expected) if expected != samples => {
                return Err(AnalysisError::MalformedDataset {
                    line,
                    message: format!("expected {} samples, found {}", expected, samples),
                });
            }
            Some(_) => {}
        }

        for (j, field) in record.iter().take(samples).enumerate() {
            let value: f32 = field.parse().map_err(|_| AnalysisError::MalformedDataset {
                line,
                message: format!("column {}: '{}' is not a number", j, field),
            })?;
            if !value.is_finite() {
                return Err(AnalysisError::MalformedDataset {
                    line,
                    message: format!("column {}: non-finite sample", j),
                });
            }
            data.push(value);
        }

        labels.push(parse_label(&record[samples], line)?);
    }

    let cols = n_samples.ok_or_else(|| AnalysisError::MalformedDataset {
        line: 0,
        message: "dataset is empty".into(),
    })?;
    let traces = TraceMatrix::new(labels.len(), cols, data)?;
    TraceDataset::new(traces, labels)
}

fn parse_label(field: &str, line: u64) -> Result<u32> {
    let value: f64 = field.parse().map_err(|_| AnalysisError::MalformedDataset {
        line,
        message: format!("label '{}' is not a number", field),
    })?;
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return Err(AnalysisError::MalformedDataset {
            line,
            message: format!("label '{}' is not a program identifier", field),
        });
    }
    Ok(value as u32)
}
