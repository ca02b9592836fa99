//! Leakcluster - unsupervised side-channel leakage detection
//!
//! This library decides whether power or EM traces captured while a target
//! routine runs can be told apart from baseline traces without a trained
//! classifier: imbalanced trial sampling, per-trial PCA, density and
//! mode-seeking clustering, and clustering-quality plus detection scores
//! aggregated over many randomized trials.

pub mod aggregate;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod dataset;
pub mod error;
pub mod neighbors;
pub mod params;
pub mod reducer;
pub mod report;
pub mod sampler;
pub mod scoring;
pub mod spectrum;

pub use aggregate::Experiment;
pub use config::ExperimentConfig;
pub use error::{AnalysisError, Result};
