//! Experiment configuration
//!
//! One immutable structure holds the channel, domain and imbalance ratio
//! selectors along with every tuning constant. It is built once from
//! defaults, an optional TOML file and CLI overrides, validated, then handed
//! to the aggregator.

use crate::error::{AnalysisError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Physical side channel the traces were captured from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Power consumption traces
    Power,
    /// Electromagnetic emanation traces
    Em,
}

impl Channel {
    fn file_prefix(self) -> &'static str {
        match self {
            Channel::Power => "Power",
            Channel::Em => "EM",
        }
    }
}

/// Feature view handed to the reducer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Raw samples over time
    Temporal,
    /// Magnitude of the real FFT of each trace
    Frequency,
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Domain::Temporal => f.write_str("temporal"),
            Domain::Frequency => f.write_str("frequency"),
        }
    }
}

/// Baseline-to-error ratio of the capture campaign, selects the dataset file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum Proportion {
    /// Same number of baseline and error traces
    #[serde(rename = "eq")]
    #[value(name = "eq")]
    Equal,
    #[serde(rename = "1:10")]
    #[value(name = "1:10")]
    OneToTen,
    #[serde(rename = "1:100")]
    #[value(name = "1:100")]
    OneToHundred,
}

/// Clustering algorithm variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    /// Reachability ordering with density-threshold extraction
    Optics,
    /// Fixed-radius density clustering
    Dbscan,
    /// Mode seeking with a flat kernel
    MeanShift,
}

impl AlgorithmKind {
    pub fn display_name(self) -> &'static str {
        match self {
            AlgorithmKind::Optics => "OPTICS",
            AlgorithmKind::Dbscan => "DBSCAN",
            AlgorithmKind::MeanShift => "Mean Shift",
        }
    }
}

/// Where mean-shift gets its geometry from
///
/// `Reduced` runs mean shift on the same projection as the density
/// algorithms and never computes a spectrum. `Spectrum` clusters a
/// projection of the trial's magnitude spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeanShiftGeometry {
    Reduced,
    Spectrum,
}

/// Algorithms evaluated at one reduced dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentPlan {
    /// Number of principal components kept
    pub components: usize,
    /// Algorithms run on each trial's projection
    pub algorithms: Vec<AlgorithmKind>,
}

/// Full configuration of an experiment sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub channel: Channel,
    pub domain: Domain,
    pub proportion: Proportion,

    /// Reduced dimensions and the algorithms evaluated at each
    pub plans: Vec<ComponentPlan>,

    /// Independent randomized trials per (pair, component count)
    pub executions: usize,

    /// Upper bound on target rows injected into one trial
    pub noise_cap: usize,

    /// Target rows injected per baseline row
    pub minority_rate: f64,

    /// `min_samples = round(n_errors * min_samples_ratio)`
    pub min_samples_ratio: f64,

    /// OPTICS extraction radius as a multiple of eps
    pub optics_eps_scale: f32,

    /// Neighbor rank used by the bandwidth estimator, as a fraction of its sample
    pub bandwidth_quantile: f64,

    /// Bandwidth sample size as a fraction of the mean class size
    pub bandwidth_sample_ratio: f64,

    /// Seed of the bandwidth estimator's row subset
    pub bandwidth_seed: u64,

    pub mean_shift_max_iter: usize,

    pub mean_shift_geometry: MeanShiftGeometry,

    /// Targets compared against baseline label 1 instead of 0
    pub alternate_baseline_targets: Vec<u32>,

    /// Program names indexed by label
    pub program_names: Vec<String>,

    /// Seed of the trial sampler, `None` for entropy
    pub seed: Option<u64>,

    /// Directory holding the dataset files
    pub data_dir: PathBuf,
}

const PROGRAM_NAMES: [&str; 20] = [
    "SUT00F",
    "SUT00I",
    "E0101",
    "E0102",
    "E0103",
    "E0104",
    "E0105",
    "E0106",
    "E0201",
    "E0202",
    "E0203",
    "E0204",
    "E0205",
    "E0206",
    "E0207",
    "E0208_1st",
    "E0208_2nd",
    "E0209_1st",
    "E0209_2nd",
    "E0210",
];

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            channel: Channel::Power,
            domain: Domain::Temporal,
            proportion: Proportion::OneToHundred,
            plans: vec![
                ComponentPlan {
                    components: 8,
                    algorithms: vec![AlgorithmKind::Optics],
                },
                ComponentPlan {
                    components: 10,
                    algorithms: vec![AlgorithmKind::Dbscan, AlgorithmKind::MeanShift],
                },
            ],
            executions: 100,
            noise_cap: 30,
            minority_rate: 0.01,
            min_samples_ratio: 0.8,
            optics_eps_scale: 1.5,
            bandwidth_quantile: 0.3,
            bandwidth_sample_ratio: 0.9,
            bandwidth_seed: 0,
            mean_shift_max_iter: 300,
            mean_shift_geometry: MeanShiftGeometry::Reduced,
            alternate_baseline_targets: vec![4, 5, 6],
            program_names: PROGRAM_NAMES.iter().map(|s| s.to_string()).collect(),
            seed: None,
            data_dir: PathBuf::from("."),
        }
    }
}

impl ExperimentConfig {
    /// Load a configuration from a TOML file; missing keys keep their defaults
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AnalysisError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| AnalysisError::Config(e.to_string()))
    }

    /// Dataset file name for the configured channel and proportion
    pub fn dataset_file_name(&self) -> String {
        let suffix = match self.proportion {
            Proportion::Equal => "",
            Proportion::OneToTen | Proportion::OneToHundred => "_Realista",
        };
        format!("{}_Traces_w_labels{}.csv", self.channel.file_prefix(), suffix)
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.data_dir.join(self.dataset_file_name())
    }

    /// Baseline label a target program is compared against
    pub fn baseline_for(&self, target: u32) -> u32 {
        if self.alternate_baseline_targets.contains(&target) {
            1
        } else {
            0
        }
    }

    /// Human-readable program name for a label
    pub fn program_name(&self, label: u32) -> String {
        self.program_names
            .get(label as usize)
            .cloned()
            .unwrap_or_else(|| format!("label{}", label))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.executions == 0 {
            return Err(AnalysisError::Config("executions must be >= 1".into()));
        }

        if self.plans.is_empty() {
            return Err(AnalysisError::Config(
                "at least one component plan is required".into(),
            ));
        }

        for plan in &self.plans {
            if plan.components == 0 {
                return Err(AnalysisError::Config(
                    "component count must be >= 1".into(),
                ));
            }
            if plan.algorithms.is_empty() {
                return Err(AnalysisError::Config(format!(
                    "plan with {} components has no algorithms",
                    plan.components
                )));
            }
        }

        if self.minority_rate <= 0.0 || self.minority_rate > 1.0 {
            return Err(AnalysisError::Config(format!(
                "minority_rate must be in (0, 1], got {}",
                self.minority_rate
            )));
        }

        if self.bandwidth_quantile <= 0.0 || self.bandwidth_quantile > 1.0 {
            return Err(AnalysisError::Config(format!(
                "bandwidth_quantile must be in (0, 1], got {}",
                self.bandwidth_quantile
            )));
        }

        if self.bandwidth_sample_ratio <= 0.0 {
            return Err(AnalysisError::Config(format!(
                "bandwidth_sample_ratio must be positive, got {}",
                self.bandwidth_sample_ratio
            )));
        }

        if self.min_samples_ratio < 0.0 {
            return Err(AnalysisError::Config(format!(
                "min_samples_ratio must be non-negative, got {}",
                self.min_samples_ratio
            )));
        }

        if self.optics_eps_scale <= 0.0 || !self.optics_eps_scale.is_finite() {
            return Err(AnalysisError::Config(format!(
                "optics_eps_scale must be positive, got {}",
                self.optics_eps_scale
            )));
        }

        if self.mean_shift_max_iter == 0 {
            return Err(AnalysisError::Config(
                "mean_shift_max_iter must be >= 1".into(),
            ));
        }

        Ok(())
    }
}
