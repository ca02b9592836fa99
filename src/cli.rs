//! CLI argument parsing for Leakcluster

use crate::config::{Channel, Domain, ExperimentConfig, Proportion};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the experiment report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "leakcluster")]
#[command(version)]
#[command(about = "Unsupervised side-channel leakage detection by clustering", long_about = None)]
pub struct Cli {
    /// Experiment configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding the labeled trace files
    #[arg(long = "data-dir", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Dataset file, overrides the name derived from channel and proportion
    #[arg(short, long, value_name = "FILE")]
    pub dataset: Option<PathBuf>,

    /// Side channel to analyze
    #[arg(long, value_enum)]
    pub channel: Option<Channel>,

    /// Feature view fed to the reducer
    #[arg(long, value_enum)]
    pub domain: Option<Domain>,

    /// Baseline-to-error ratio of the capture campaign
    #[arg(long, value_enum)]
    pub proportion: Option<Proportion>,

    /// Randomized trials per program pair and component count
    #[arg(short = 'n', long, value_name = "N")]
    pub executions: Option<usize>,

    /// Seed for reproducible trial sampling
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Apply command-line overrides on top of a loaded configuration
    pub fn apply_overrides(&self, config: &mut ExperimentConfig) {
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(channel) = self.channel {
            config.channel = channel;
        }
        if let Some(domain) = self.domain {
            config.domain = domain;
        }
        if let Some(proportion) = self.proportion {
            config.proportion = proportion;
        }
        if let Some(executions) = self.executions {
            config.executions = executions;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
    }

    /// Dataset file to load: the explicit one, or the configured default
    pub fn dataset_path(&self, config: &ExperimentConfig) -> PathBuf {
        self.dataset
            .clone()
            .unwrap_or_else(|| config.dataset_path())
    }
}
