//! Aggregator: repeated randomized trials per pair and component count
//!
//! For every program pair and every configured component count the
//! experiment runs `executions` independent trials. Each trial draws a fresh
//! imbalanced sample, reduces it, estimates parameters, and scores every
//! algorithm of the plan. A trial that fails for one algorithm is logged and
//! counted; it never stops the sweep.

use crate::cluster::ClusteringAlgorithm;
use crate::config::{AlgorithmKind, ComponentPlan, Domain, ExperimentConfig, MeanShiftGeometry};
use crate::dataset::{TraceDataset, TraceMatrix};
use crate::error::{AnalysisError, Result};
use crate::neighbors::DistanceMatrix;
use crate::params::{self, ClusterParams, EstimatorSettings};
use crate::reducer::{self, ReducedSample};
use crate::report::{
    AlgorithmSummary, ConfigurationReport, ExperimentReport, PairReport, ScoreSummary,
};
use crate::sampler::{ProgramPair, TrialSample, TrialSampler};
use crate::scoring::{self, TrialMetrics};
use crate::spectrum::magnitude_spectrum;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// Reduced points of one trial with the parameters estimated on them
#[derive(Debug, Clone)]
pub struct TrialView {
    pub reduced: ReducedSample,
    pub params: ClusterParams,
}

/// Result of one algorithm on one trial
#[derive(Debug)]
pub struct TrialOutcome {
    pub algorithm: AlgorithmKind,
    pub feature_domain: Domain,
    pub metrics: Result<TrialMetrics>,
}

/// Per-trial results of one algorithm, folded into a summary at the end
#[derive(Debug, Clone, Default)]
pub struct MetricAccumulator {
    cluster_counts: Vec<usize>,
    noise_points: Vec<f32>,
    silhouettes: Vec<f32>,
    mutual_information: Vec<f32>,
    aucs: Vec<f32>,
    failed: usize,
}

impl MetricAccumulator {
    pub fn record(&mut self, metrics: &TrialMetrics) {
        self.cluster_counts.push(metrics.cluster_count);
        self.noise_points.push(metrics.noise_count as f32);
        self.mutual_information.push(metrics.mutual_information);
        if let Some(s) = metrics.silhouette {
            self.silhouettes.push(s);
        }
        if let Some(a) = metrics.auc {
            self.aucs.push(a);
        }
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn completed(&self) -> usize {
        self.cluster_counts.len()
    }

    pub fn summarize(&self, algorithm: AlgorithmKind, feature_domain: Domain) -> AlgorithmSummary {
        let (dominant, occurrences) = dominant_cluster_counts(&self.cluster_counts);
        let dominant_frequency_pct = if self.completed() == 0 {
            0.0
        } else {
            occurrences as f32 * 100.0 / self.completed() as f32
        };

        let auc = if self.aucs.len() >= 2 {
            ScoreSummary::from_values(&self.aucs)
        } else {
            None
        };

        AlgorithmSummary {
            algorithm: algorithm.display_name().to_string(),
            feature_domain,
            trials: self.completed() + self.failed,
            failed_trials: self.failed,
            dominant_cluster_count: dominant.first().copied(),
            dominant_cluster_counts: dominant,
            dominant_frequency_pct,
            mean_noise_points: ScoreSummary::from_values(&self.noise_points)
                .map(|s| s.mean)
                .unwrap_or(0.0),
            silhouette: ScoreSummary::from_values(&self.silhouettes),
            mutual_information: ScoreSummary::from_values(&self.mutual_information),
            auc,
        }
    }
}

/// Most frequent values of `counts` (ascending) and how often each occurs
pub fn dominant_cluster_counts(counts: &[usize]) -> (Vec<usize>, usize) {
    let mut histogram: BTreeMap<usize, usize> = BTreeMap::new();
    for &c in counts {
        *histogram.entry(c).or_insert(0) += 1;
    }

    let best = histogram.values().copied().max().unwrap_or(0);
    let modes = histogram
        .into_iter()
        .filter(|&(_, n)| n == best)
        .map(|(c, _)| c)
        .collect();

    (modes, best)
}

/// A configured sweep over one dataset
pub struct Experiment {
    config: ExperimentConfig,
    dataset: TraceDataset,
    pairs: Vec<ProgramPair>,
    settings: EstimatorSettings,
}

impl Experiment {
    /// Validate the configuration and enumerate the program pairs
    ///
    /// Pairs whose baseline has no traces are skipped.
    pub fn new(config: ExperimentConfig, dataset: TraceDataset) -> Result<Self> {
        config.validate()?;

        let mut pairs = Vec::new();
        for target in dataset.target_labels() {
            let baseline = config.baseline_for(target);
            if dataset.count_of(baseline) == 0 {
                tracing::warn!(baseline, target, "baseline has no traces, skipping pair");
                continue;
            }
            pairs.push(ProgramPair { baseline, target });
        }

        tracing::info!(
            traces = dataset.len(),
            samples = dataset.traces().n_cols(),
            pairs = pairs.len(),
            "experiment prepared"
        );

        Ok(Self {
            settings: EstimatorSettings::from(&config),
            config,
            dataset,
            pairs,
        })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn pairs(&self) -> &[ProgramPair] {
        &self.pairs
    }

    /// Run the sweep with the configured seed (entropy when unset)
    pub fn run(&self) -> Result<ExperimentReport> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.run_with_rng(&mut rng)
    }

    pub fn run_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<ExperimentReport> {
        let mut report = ExperimentReport::new(
            self.config.channel,
            self.config.domain,
            self.config.proportion,
            self.config.executions,
        );

        for &pair in &self.pairs {
            report.pairs.push(self.run_pair(pair, rng)?);
        }

        Ok(report)
    }

    /// Every configured component count for one pair
    pub fn run_pair<R: Rng + ?Sized>(&self, pair: ProgramPair, rng: &mut R) -> Result<PairReport> {
        let sampler = TrialSampler::new(
            &self.dataset,
            pair,
            self.config.minority_rate,
            self.config.noise_cap,
        )?;

        let configurations = self
            .config
            .plans
            .iter()
            .map(|plan| self.run_configuration(&sampler, plan, rng))
            .collect::<Result<Vec<_>>>()?;

        Ok(PairReport {
            baseline: pair.baseline,
            target: pair.target,
            baseline_name: self.config.program_name(pair.baseline),
            target_name: self.config.program_name(pair.target),
            configurations,
        })
    }

    fn run_configuration<R: Rng + ?Sized>(
        &self,
        sampler: &TrialSampler,
        plan: &ComponentPlan,
        rng: &mut R,
    ) -> Result<ConfigurationReport> {
        let pair = sampler.pair();
        let algorithms: Vec<(AlgorithmKind, Box<dyn ClusteringAlgorithm>)> = plan
            .algorithms
            .iter()
            .map(|&kind| (kind, kind.build(&self.config)))
            .collect();
        let mut accumulators = vec![MetricAccumulator::default(); algorithms.len()];

        for execution in 0..self.config.executions {
            let outcomes = self.run_trial(sampler, plan.components, &algorithms, rng);
            for (accumulator, outcome) in accumulators.iter_mut().zip(outcomes) {
                match outcome.metrics {
                    Ok(metrics) => accumulator.record(&metrics),
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        tracing::warn!(
                            baseline = pair.baseline,
                            target = pair.target,
                            components = plan.components,
                            execution,
                            algorithm = outcome.algorithm.display_name(),
                            error = %e,
                            "trial failed"
                        );
                        accumulator.record_failure();
                    }
                }
            }
        }

        let results: Vec<AlgorithmSummary> = algorithms
            .iter()
            .zip(&accumulators)
            .map(|((kind, _), acc)| acc.summarize(*kind, self.feature_domain(*kind)))
            .collect();

        tracing::info!(
            baseline = pair.baseline,
            target = pair.target,
            components = plan.components,
            executions = self.config.executions,
            "configuration complete"
        );

        Ok(ConfigurationReport {
            components: plan.components,
            results,
        })
    }

    /// Feature view an algorithm's results refer to
    pub fn feature_domain(&self, kind: AlgorithmKind) -> Domain {
        if self.uses_spectrum_geometry(kind) {
            Domain::Frequency
        } else {
            self.config.domain
        }
    }

    fn uses_spectrum_geometry(&self, kind: AlgorithmKind) -> bool {
        kind == AlgorithmKind::MeanShift
            && self.config.mean_shift_geometry == MeanShiftGeometry::Spectrum
    }

    /// Reduce `features` and estimate the trial's parameters on the projection
    pub fn prepare_view(
        &self,
        features: &TraceMatrix,
        sample: &TrialSample,
        components: usize,
    ) -> Result<TrialView> {
        let reduced = reducer::reduce(features, components)?;
        tracing::trace!(
            components,
            variance_explained = reduced.total_variance_explained(),
            "projected trial features"
        );
        let distances = DistanceMatrix::new(&reduced.points);
        let params = params::estimate(
            &distances,
            sample.n_errors,
            sample.mean_class_size(),
            &self.settings,
        )?;
        Ok(TrialView { reduced, params })
    }

    /// One randomized trial: one outcome per algorithm, in plan order
    pub fn run_trial<R: Rng + ?Sized>(
        &self,
        sampler: &TrialSampler,
        components: usize,
        algorithms: &[(AlgorithmKind, Box<dyn ClusteringAlgorithm>)],
        rng: &mut R,
    ) -> Vec<TrialOutcome> {
        let fail_all = |e: AnalysisError| -> Vec<TrialOutcome> {
            algorithms
                .iter()
                .map(|(kind, _)| TrialOutcome {
                    algorithm: *kind,
                    feature_domain: self.feature_domain(*kind),
                    metrics: Err(e.clone()),
                })
                .collect()
        };

        let sample = match sampler.draw(&self.dataset, rng) {
            Ok(sample) => sample,
            Err(e) => return fail_all(e),
        };

        let primary = match self.config.domain {
            Domain::Temporal => self.prepare_view(&sample.features, &sample, components),
            Domain::Frequency => magnitude_spectrum(&sample.features)
                .and_then(|spectrum| self.prepare_view(&spectrum, &sample, components)),
        };

        let needs_spectrum = algorithms
            .iter()
            .any(|(kind, _)| self.uses_spectrum_geometry(*kind));
        let spectral = if needs_spectrum && self.config.domain == Domain::Temporal {
            Some(
                magnitude_spectrum(&sample.features)
                    .and_then(|spectrum| self.prepare_view(&spectrum, &sample, components)),
            )
        } else {
            None
        };

        tracing::debug!(
            rows = sample.len(),
            targets = sample.target_count,
            n_errors = sample.n_errors,
            "trial sampled"
        );

        algorithms
            .iter()
            .map(|(kind, algorithm)| {
                let view = match &spectral {
                    Some(view) if self.uses_spectrum_geometry(*kind) => view,
                    _ => &primary,
                };
                let metrics = match view {
                    Ok(view) => algorithm
                        .fit(&view.reduced.points, &view.params)
                        .and_then(|assignment| {
                            scoring::score(&view.reduced.points, &sample.labels, &assignment)
                        }),
                    Err(e) => Err(e.clone()),
                };
                TrialOutcome {
                    algorithm: *kind,
                    feature_domain: self.feature_domain(*kind),
                    metrics,
                }
            })
            .collect()
    }
}
