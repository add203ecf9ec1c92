use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use csmc_core::errors::ErrorInfo;
use csmc_core::{CsmcError, LikelihoodOracle, RngHandle};
use csmc_io::to_newick;
use csmc_lik::{Alignment, NucleotideModel, PruningOracle};
use csmc_tree::{topology_hash, BufferPool, Forest, PoolStats};
use indexmap::IndexSet;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::determinism;
use crate::manifest::{InputProvenance, RunManifest};
use crate::metrics::{MetricSample, MetricsRecorder};
use crate::particle::Particle;

/// Phase of a [`Sampler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplerState {
    /// Population created, no iteration run yet.
    Initialized,
    /// Some iterations done; `next` is the index of the next one.
    Iterating {
        /// Index of the next iteration.
        next: usize,
        /// Iterations left before completion.
        remaining: usize,
    },
    /// Every forest holds a single tree.
    Complete,
}

/// One finished tree and its weights.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeSample {
    /// Newick rendering including the root branch.
    pub newick: String,
    /// Unnormalised log-weight of the particle.
    pub log_weight: f64,
    /// Weight relative to the final population.
    pub normalized_weight: f64,
    /// Height of the root on the forest clock.
    pub root_height: f64,
    /// Length of the branch drawn above the root.
    pub root_branch_length: f64,
    /// Canonical topology digest (labels only, child order ignored).
    pub topology_hash: String,
}

/// Summary returned to callers after a run completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// Population size.
    pub particles: usize,
    /// Number of tips in every tree.
    pub tip_count: usize,
    /// Iterations performed.
    pub iterations: usize,
    /// Finished tree of every particle, in population order.
    pub trees: Vec<TreeSample>,
    /// Index of the particle with the largest normalised weight.
    pub best_index: usize,
    /// Effective sample size of the final population.
    pub final_ess: f64,
    /// Number of distinct topologies in the final population.
    pub distinct_topologies: usize,
    /// Per-iteration diagnostics.
    pub metrics: Vec<MetricSample>,
    /// Buffer pool counters at completion.
    pub pool: PoolStats,
    /// Tree list written during the run.
    pub trees_path: Option<PathBuf>,
    /// Metrics CSV written during the run.
    pub metrics_path: Option<PathBuf>,
    /// Summary JSON written during the run.
    pub summary_path: Option<PathBuf>,
    /// Manifest path, if emitted.
    pub manifest_path: Option<PathBuf>,
}

impl RunSummary {
    /// Tree with the largest normalised weight.
    pub fn best(&self) -> Option<&TreeSample> {
        self.trees.get(self.best_index)
    }
}

/// Population of particles advanced one coalescent step at a time.
///
/// Each iteration runs [`Sampler::resample`], [`Sampler::propose`] and
/// [`Sampler::normalize`] in that order; [`Sampler::step`] chains them and
/// records metrics. A run needs exactly `tip_count - 1` iterations.
pub struct Sampler {
    config: RunConfig,
    oracle: Arc<dyn LikelihoodOracle>,
    pool: Arc<BufferPool>,
    particles: Vec<Particle>,
    iteration: usize,
    iterations: usize,
    recorder: MetricsRecorder,
}

impl fmt::Debug for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sampler")
            .field("particles", &self.particles.len())
            .field("iteration", &self.iteration)
            .field("iterations", &self.iterations)
            .field("pool", &self.pool.stats())
            .finish_non_exhaustive()
    }
}

impl Sampler {
    /// Validates `config` and creates the initial population.
    ///
    /// Every particle starts from its own tip-only forest with log-weight
    /// `ln(1/N)`. All forests share one buffer pool sized for `oracle`.
    pub fn new(config: &RunConfig, oracle: Arc<dyn LikelihoodOracle>) -> Result<Self, CsmcError> {
        config.validate()?;
        let tip_count = oracle.tip_count();
        if tip_count < 2 {
            return Err(CsmcError::Input(
                ErrorInfo::new("too-few-tips", "at least two sequences are required")
                    .with_context("tips", tip_count.to_string()),
            ));
        }

        let pool = BufferPool::new(oracle.dims());
        let master_seed = config.seed_policy.master_seed;
        let initial_log_weight = -(config.particles as f64).ln();
        let particles = (0..config.particles)
            .map(|index| {
                let forest = Forest::new(Arc::clone(&oracle), Arc::clone(&pool))?;
                Ok(Particle::new(
                    forest,
                    initial_log_weight,
                    determinism::particle_seed(master_seed, index),
                ))
            })
            .collect::<Result<Vec<_>, CsmcError>>()?;

        let mut sampler = Self {
            config: config.clone(),
            oracle,
            pool,
            particles,
            iteration: 0,
            iterations: tip_count - 1,
            recorder: MetricsRecorder::new(),
        };
        sampler.normalize()?;
        tracing::info!(
            particles = config.particles,
            tips = tip_count,
            iterations = sampler.iterations,
            seed = master_seed,
            "sampler initialised"
        );
        Ok(sampler)
    }

    /// Current phase.
    pub fn state(&self) -> SamplerState {
        if self.iteration >= self.iterations {
            SamplerState::Complete
        } else if self.iteration == 0 {
            SamplerState::Initialized
        } else {
            SamplerState::Iterating {
                next: self.iteration,
                remaining: self.iterations - self.iteration,
            }
        }
    }

    /// Whether every forest holds a single tree.
    pub fn is_complete(&self) -> bool {
        self.state() == SamplerState::Complete
    }

    /// Live population.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Buffer pool shared by the population.
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Likelihood oracle shared by the population.
    pub fn oracle(&self) -> &Arc<dyn LikelihoodOracle> {
        &self.oracle
    }

    /// Metrics recorded so far.
    pub fn metrics(&self) -> &MetricsRecorder {
        &self.recorder
    }

    /// Roots per forest before the next merge.
    pub fn lineages(&self) -> usize {
        self.oracle.tip_count() - self.iteration
    }

    /// Rate used for the next merge.
    pub fn rate(&self) -> f64 {
        self.config.rate_law.rate(self.lineages())
    }

    /// Replaces every slot with a replicate of an ancestor drawn in proportion
    /// to the normalised weights.
    ///
    /// Returns the number of distinct ancestors kept.
    pub fn resample(&mut self) -> Result<usize, CsmcError> {
        let weights: Vec<f64> = self.particles.iter().map(Particle::normalized_weight).collect();
        let distribution = WeightedIndex::new(&weights).map_err(|err| {
            CsmcError::Rng(
                ErrorInfo::new("resample-weights", err.to_string())
                    .with_context("iteration", self.iteration.to_string()),
            )
        })?;
        let master_seed = self.config.seed_policy.master_seed;
        let iteration = self.iteration;
        let mut rng = RngHandle::from_seed(determinism::resample_seed(master_seed, iteration));
        let mut ancestors = IndexSet::new();
        let next: Vec<Particle> = (0..self.particles.len())
            .map(|slot| {
                let source = distribution.sample(&mut rng);
                ancestors.insert(source);
                self.particles[source]
                    .replicate(determinism::replicate_seed(master_seed, iteration, slot))
            })
            .collect();
        self.particles = next;
        tracing::debug!(iteration, distinct = ancestors.len(), "resampled population");
        Ok(ancestors.len())
    }

    /// Lets every particle merge two of its roots.
    ///
    /// Returns `ln` of the mean incremental weight.
    pub fn propose(&mut self, rate: f64) -> Result<f64, CsmcError> {
        let iteration = self.iteration;
        let mut factors = Vec::with_capacity(self.particles.len());
        for (index, particle) in self.particles.iter_mut().enumerate() {
            let outcome = particle
                .propose(rate)
                .map_err(|err| tag_particle(err, iteration, index))?;
            tracing::debug!(
                iteration,
                particle = index,
                left = outcome.left,
                right = outcome.right,
                height = outcome.height,
                factor = outcome.likelihood_factor,
                "proposed merge"
            );
            factors.push(outcome.likelihood_factor);
        }
        Ok(log_sum_exp(&factors) - (factors.len() as f64).ln())
    }

    /// Recomputes normalised weights with max-subtracted exponentiation.
    ///
    /// Returns the effective sample size `1 / sum(w^2)`.
    pub fn normalize(&mut self) -> Result<f64, CsmcError> {
        let max = self
            .particles
            .iter()
            .map(Particle::log_weight)
            .fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return Err(CsmcError::Invariant(
                ErrorInfo::new("non-finite-weight", "no particle has a finite log-weight")
                    .with_context("iteration", self.iteration.to_string()),
            ));
        }
        let mut total = 0.0;
        for particle in &mut self.particles {
            let weight = (particle.log_weight() - max).exp();
            particle.set_normalized_weight(weight);
            total += weight;
        }
        for particle in &mut self.particles {
            particle.set_normalized_weight(particle.normalized_weight() / total);
        }
        Ok(effective_sample_size(&self.particles))
    }

    /// Runs one full iteration and records its metrics.
    pub fn step(&mut self) -> Result<MetricSample, CsmcError> {
        if self.is_complete() {
            return Err(CsmcError::Invariant(
                ErrorInfo::new("sampler-complete", "every forest already holds a single tree")
                    .with_context("iterations", self.iterations.to_string()),
            ));
        }
        let iteration = self.iteration;
        let lineages = self.lineages();
        let rate = self.rate();

        let distinct_ancestors = self.resample()?;
        let log_mean_increment = self.propose(rate)?;
        let ess = self.normalize()?;
        self.iteration += 1;

        let sample = MetricSample {
            iteration,
            lineages,
            rate,
            ess,
            max_log_weight: self
                .particles
                .iter()
                .map(Particle::log_weight)
                .fold(f64::NEG_INFINITY, f64::max),
            log_mean_increment,
            distinct_ancestors,
            outstanding_buffers: self.pool.stats().outstanding(),
        };
        tracing::info!(iteration, lineages, rate, ess, "iteration complete");
        let floor = self.config.ess_warning_fraction * self.particles.len() as f64;
        if ess < floor {
            tracing::warn!(iteration, ess, floor, "effective sample size is low");
        }
        self.recorder.push(sample.clone());
        Ok(sample)
    }

    /// Steps until every forest holds a single tree.
    pub fn run_to_completion(&mut self) -> Result<(), CsmcError> {
        while !self.is_complete() {
            self.step()?;
        }
        Ok(())
    }

    /// Collects the finished trees.
    ///
    /// Each tree gets a root branch drawn from `Exp(1)` on a dedicated stream,
    /// so calling this twice yields the same summary.
    pub fn summarize(&self) -> Result<RunSummary, CsmcError> {
        if !self.is_complete() {
            return Err(CsmcError::Invariant(
                ErrorInfo::new("sampler-incomplete", "trees are only available at completion")
                    .with_context("iteration", self.iteration.to_string())
                    .with_context("iterations", self.iterations.to_string()),
            ));
        }
        let mut rng =
            RngHandle::from_seed(determinism::root_branch_seed(self.config.seed_policy.master_seed));
        let mut topologies = IndexSet::new();
        let mut trees = Vec::with_capacity(self.particles.len());
        for (index, particle) in self.particles.iter().enumerate() {
            let Some(root) = particle.forest().tree() else {
                return Err(CsmcError::Invariant(
                    ErrorInfo::new("incomplete-forest", "particle holds more than one root")
                        .with_context("particle", index.to_string())
                        .with_context("roots", particle.forest().root_count().to_string()),
                ));
            };
            let root_branch_length = rng.exponential(1.0)?;
            let hash = topology_hash(root);
            topologies.insert(hash.clone());
            trees.push(TreeSample {
                newick: to_newick(root, Some(root_branch_length)),
                log_weight: particle.log_weight(),
                normalized_weight: particle.normalized_weight(),
                root_height: root.height(),
                root_branch_length,
                topology_hash: hash,
            });
        }

        let mut best_index = 0;
        for (index, tree) in trees.iter().enumerate() {
            if tree.normalized_weight > trees[best_index].normalized_weight {
                best_index = index;
            }
        }

        Ok(RunSummary {
            particles: self.particles.len(),
            tip_count: self.oracle.tip_count(),
            iterations: self.iterations,
            trees,
            best_index,
            final_ess: effective_sample_size(&self.particles),
            distinct_topologies: topologies.len(),
            metrics: self.recorder.samples().to_vec(),
            pool: self.pool.stats(),
            trees_path: None,
            metrics_path: None,
            summary_path: None,
            manifest_path: None,
        })
    }

    fn write_artefacts(
        &self,
        run_dir: &Path,
        summary: &mut RunSummary,
        input: Option<InputProvenance>,
    ) -> Result<(), CsmcError> {
        let output = &self.config.output;
        fs::create_dir_all(run_dir).map_err(|err| io_error("run-dir-mkdir", err, run_dir))?;

        let trees_path = run_dir.join(&output.trees_file);
        let lines: String = summary
            .trees
            .iter()
            .map(|tree| format!("{} {}\n", tree.normalized_weight, tree.newick))
            .collect();
        fs::write(&trees_path, lines).map_err(|err| io_error("trees-write", err, &trees_path))?;

        let metrics_path = run_dir.join(&output.metrics_file);
        self.recorder
            .write_csv(&metrics_path)
            .map_err(|err| io_error("metrics-write", err, &metrics_path))?;

        let summary_path = run_dir.join(&output.summary_file);
        let manifest_path = run_dir.join(&output.manifest_file);
        summary.trees_path = Some(trees_path);
        summary.metrics_path = Some(metrics_path);
        summary.summary_path = Some(summary_path.clone());
        summary.manifest_path = Some(manifest_path.clone());

        let json = serde_json::to_string_pretty(summary)
            .map_err(|err| io_error("summary-serialize", err, &summary_path))?;
        fs::write(&summary_path, json).map_err(|err| io_error("summary-write", err, &summary_path))?;

        let manifest = RunManifest {
            config: self.config.clone(),
            master_seed: self.config.seed_policy.master_seed,
            seed_label: self.config.seed_policy.label.clone(),
            input,
            tip_count: summary.tip_count,
            created_at: chrono::Utc::now().to_rfc3339(),
            trees_file: Some(output.trees_file.clone()),
            metrics_file: Some(output.metrics_file.clone()),
            summary_file: Some(output.summary_file.clone()),
        };
        manifest.write(&manifest_path)
    }
}

/// Runs the sampler on `alignment` with the built-in likelihood oracle.
pub fn run(config: &RunConfig, alignment: Alignment) -> Result<RunSummary, CsmcError> {
    let input = InputProvenance {
        alignment_sha256: alignment.digest().to_string(),
        site_count: alignment.site_count(),
    };
    let model = NucleotideModel::new(&config.model)?;
    let oracle: Arc<dyn LikelihoodOracle> = Arc::new(PruningOracle::new(alignment, model));
    execute(config, oracle, Some(input))
}

/// Runs the sampler against a caller-supplied likelihood oracle.
pub fn run_with_oracle(
    config: &RunConfig,
    oracle: Arc<dyn LikelihoodOracle>,
) -> Result<RunSummary, CsmcError> {
    execute(config, oracle, None)
}

fn execute(
    config: &RunConfig,
    oracle: Arc<dyn LikelihoodOracle>,
    input: Option<InputProvenance>,
) -> Result<RunSummary, CsmcError> {
    tracing::info!(
        particles = config.particles,
        tips = oracle.tip_count(),
        "starting smc run"
    );
    let mut sampler = Sampler::new(config, oracle)?;
    sampler.run_to_completion()?;
    let mut summary = sampler.summarize()?;
    if let Some(run_dir) = &config.output.run_directory {
        sampler.write_artefacts(run_dir, &mut summary, input)?;
    }
    tracing::info!(
        best = summary.best_index,
        ess = summary.final_ess,
        min_ess = sampler.metrics().min_ess().unwrap_or(summary.final_ess),
        topologies = summary.distinct_topologies,
        "smc run complete"
    );
    Ok(summary)
}

fn effective_sample_size(particles: &[Particle]) -> f64 {
    let sum_sq: f64 = particles
        .iter()
        .map(|particle| particle.normalized_weight().powi(2))
        .sum();
    1.0 / sum_sq
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|value| (value - max).exp()).sum::<f64>().ln()
}

fn tag_particle(err: CsmcError, iteration: usize, particle: usize) -> CsmcError {
    match err {
        CsmcError::Invariant(info) => CsmcError::Invariant(
            info.with_context("iteration", iteration.to_string())
                .with_context("particle", particle.to_string()),
        ),
        other => other,
    }
}

fn io_error(code: &str, err: impl ToString, path: &Path) -> CsmcError {
    CsmcError::Serde(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::log_sum_exp;

    #[test]
    fn log_sum_exp_is_stable_for_large_magnitudes() {
        let value = log_sum_exp(&[-1000.0, -1000.0]);
        assert!((value - (-1000.0 + 2f64.ln())).abs() < 1e-12);
        let value = log_sum_exp(&[800.0, 0.0]);
        assert!((value - 800.0).abs() < 1e-12);
    }
}
