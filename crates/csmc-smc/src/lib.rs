#![deny(missing_docs)]

//! Combinatorial sequential Monte Carlo sampler over phylogenetic forests.
//!
//! A [`Sampler`] owns a population of [`Particle`]s, each growing its own
//! forest one merge per iteration. Resampling replicates particles by sharing
//! their tree fragments, so the cost of an iteration does not depend on tree
//! size. [`run`] drives a full run and writes the optional artefacts.

/// YAML configuration schema and defaults.
pub mod config;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Core sampling kernel and public `run` entry points.
pub mod kernel;
/// Run manifest serialization helpers.
pub mod manifest;
/// Per-iteration metrics collection.
pub mod metrics;
/// Weighted particle and its proposal step.
pub mod particle;

pub use config::{OutputConfig, RateLaw, RunConfig, SeedPolicy};
pub use kernel::{run, run_with_oracle, RunSummary, Sampler, SamplerState, TreeSample};
pub use manifest::{InputProvenance, RunManifest};
pub use metrics::{MetricSample, MetricsRecorder};
pub use particle::{Particle, ProposalOutcome};
