//! Experiment report: structured records and text rendering
//!
//! The same records back the human-readable report and the JSON output.

use crate::config::{Channel, Domain, Proportion};
use serde::Serialize;

/// Mean and sample standard deviation of one score across trials
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub mean: f32,
    /// Needs at least 2 samples
    pub stdev: Option<f32>,
    pub samples: usize,
}

impl ScoreSummary {
    /// Summarize `values`; `None` when empty
    pub fn from_values(values: &[f32]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let v = trueno::Vector::from_slice(values);
        let mean = v.mean().unwrap_or(0.0);

        let stdev = if values.len() >= 2 {
            let squared: Vec<f32> = values.iter().map(|x| (x - mean) * (x - mean)).collect();
            let sum_sq = trueno::Vector::from_slice(&squared).sum().unwrap_or(0.0);
            Some((sum_sq / (values.len() - 1) as f32).sqrt())
        } else {
            None
        };

        Some(Self {
            mean,
            stdev,
            samples: values.len(),
        })
    }
}

/// Aggregated results of one algorithm over the trials of a configuration
#[derive(Debug, Clone, Serialize)]
pub struct AlgorithmSummary {
    pub algorithm: String,
    /// Feature view the algorithm clustered
    pub feature_domain: Domain,
    /// Trials attempted
    pub trials: usize,
    /// Trials that ended in an error for this algorithm
    pub failed_trials: usize,
    /// Every most frequent cluster count, ascending
    pub dominant_cluster_counts: Vec<usize>,
    /// Smallest most frequent cluster count
    pub dominant_cluster_count: Option<usize>,
    /// Share of completed trials with the dominant count, in percent
    pub dominant_frequency_pct: f32,
    pub mean_noise_points: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silhouette: Option<ScoreSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutual_information: Option<ScoreSummary>,
    /// Reported only when at least 2 trials found exactly two clusters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auc: Option<ScoreSummary>,
}

impl AlgorithmSummary {
    pub fn completed_trials(&self) -> usize {
        self.trials - self.failed_trials
    }
}

/// Results at one reduced dimension
#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationReport {
    pub components: usize,
    pub results: Vec<AlgorithmSummary>,
}

/// Results of one baseline/target comparison
#[derive(Debug, Clone, Serialize)]
pub struct PairReport {
    pub baseline: u32,
    pub target: u32,
    pub baseline_name: String,
    pub target_name: String,
    pub configurations: Vec<ConfigurationReport>,
}

/// Root of the experiment output
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentReport {
    /// Format name
    pub format: String,
    /// Crate version that produced the report
    pub version: String,
    pub channel: Channel,
    pub domain: Domain,
    pub proportion: Proportion,
    /// Trials per configuration
    pub executions: usize,
    pub pairs: Vec<PairReport>,
}

impl ExperimentReport {
    pub fn new(channel: Channel, domain: Domain, proportion: Proportion, executions: usize) -> Self {
        Self {
            format: "leakcluster-json-v1".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            channel,
            domain,
            proportion,
            executions,
            pairs: Vec::new(),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn channel_name(channel: Channel) -> &'static str {
    match channel {
        Channel::Power => "power",
        Channel::Em => "EM",
    }
}

fn proportion_name(proportion: Proportion) -> &'static str {
    match proportion {
        Proportion::Equal => "eq",
        Proportion::OneToTen => "1:10",
        Proportion::OneToHundred => "1:100",
    }
}

fn score_line(label: &str, summary: &Option<ScoreSummary>) -> String {
    match summary {
        Some(ScoreSummary {
            mean,
            stdev: Some(stdev),
            ..
        }) => format!("    {}: {:.4} \u{00b1} {:.4}\n", label, mean, stdev),
        Some(ScoreSummary { mean, .. }) => format!("    {}: {:.4}\n", label, mean),
        None => format!("    {}: n/a\n", label),
    }
}

fn render_summary(output: &mut String, summary: &AlgorithmSummary) {
    output.push_str(&format!(
        "  {} ({} features)\n",
        summary.algorithm, summary.feature_domain
    ));

    match summary.dominant_cluster_count {
        Some(count) => {
            output.push_str(&format!(
                "    Clusters: {} in {:.0}% of executions",
                count, summary.dominant_frequency_pct
            ));
            if summary.dominant_cluster_counts.len() > 1 {
                let tied: Vec<String> = summary
                    .dominant_cluster_counts
                    .iter()
                    .map(|c| c.to_string())
                    .collect();
                output.push_str(&format!(" (tied: {})", tied.join(", ")));
            }
            output.push('\n');
        }
        None => output.push_str("    Clusters: no completed executions\n"),
    }

    output.push_str(&format!(
        "    Noise points: {:.2} on average\n",
        summary.mean_noise_points
    ));
    output.push_str(&score_line("Silhouette", &summary.silhouette));
    output.push_str(&score_line("Mutual information", &summary.mutual_information));
    if summary.auc.is_some() {
        output.push_str(&score_line("AUC", &summary.auc));
    }
    if summary.failed_trials > 0 {
        output.push_str(&format!(
            "    Failed executions: {} of {}\n",
            summary.failed_trials, summary.trials
        ));
    }
}

/// Human-readable report, one block per pair and component count
pub fn render_text(report: &ExperimentReport) -> String {
    let mut output = String::new();

    output.push_str("\n=== Side-Channel Leakage Clustering Report ===\n");
    output.push_str(&format!(
        "Channel: {}  Domain: {}  Proportion: {}  Executions: {}\n",
        channel_name(report.channel),
        report.domain,
        proportion_name(report.proportion),
        report.executions
    ));

    if report.pairs.is_empty() {
        output.push_str("\nNo program pairs to analyze.\n");
        return output;
    }

    for pair in &report.pairs {
        output.push_str(&format!(
            "\n{} ({}) vs {} ({})\n",
            pair.baseline_name, pair.baseline, pair.target_name, pair.target
        ));
        for configuration in &pair.configurations {
            output.push_str(&format!(" Components: {}\n", configuration.components));
            for summary in &configuration.results {
                render_summary(&mut output, summary);
            }
        }
    }

    output
}
