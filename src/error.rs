//! Error types for the leakage-detection pipeline
//!
//! Fatal conditions (unreadable or malformed dataset, bad configuration)
//! abort the run. Everything else is local to one trial and is absorbed by
//! the aggregator.

use std::fmt;
use thiserror::Error;

/// Pipeline stage an error originated from, used in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loading,
    Sampling,
    Reduction,
    Estimation,
    Clustering,
    Scoring,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Loading => "loading",
            Stage::Sampling => "sampling",
            Stage::Reduction => "reduction",
            Stage::Estimation => "parameter estimation",
            Stage::Clustering => "clustering",
            Stage::Scoring => "scoring",
        };
        f.write_str(name)
    }
}

/// Errors for trace analysis operations
#[derive(Error, Debug, Clone)]
pub enum AnalysisError {
    #[error("Cannot read dataset {path}: {message}")]
    Dataset { path: String, message: String },

    #[error("Malformed dataset at line {line}: {message}")]
    MalformedDataset { line: u64, message: String },

    #[error("Shape mismatch: {rows} trace rows but {labels} labels")]
    ShapeMismatch { rows: usize, labels: usize },

    #[error("Data integrity violation: row {row} has label {label}, expected {baseline} or {target}")]
    DataIntegrity {
        row: usize,
        label: u32,
        baseline: u32,
        target: u32,
    },

    #[error("Degenerate input during {stage}: {reason}")]
    DegenerateInput { stage: Stage, reason: String },

    #[error("{metric} unavailable: {reason}")]
    MetricPrecondition {
        metric: &'static str,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AnalysisError {
    pub(crate) fn degenerate(stage: Stage, reason: impl Into<String>) -> Self {
        AnalysisError::DegenerateInput {
            stage,
            reason: reason.into(),
        }
    }

    /// True for errors that invalidate the whole run rather than one trial
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AnalysisError::Dataset { .. }
                | AnalysisError::MalformedDataset { .. }
                | AnalysisError::ShapeMismatch { .. }
                | AnalysisError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
