use std::fs;
use std::path::{Path, PathBuf};

use csmc_core::errors::ErrorInfo;
use csmc_core::CsmcError;
use csmc_lik::ModelConfig;
use serde::{Deserialize, Serialize};

/// YAML-configurable parameters governing one SMC run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Population size.
    #[serde(default = "default_particles")]
    pub particles: usize,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Exponential rate used for height increments.
    #[serde(default)]
    pub rate_law: RateLaw,
    /// Substitution model of the built-in likelihood oracle.
    #[serde(default)]
    pub model: ModelConfig,
    /// Fraction of the population below which a low effective sample size is reported.
    #[serde(default = "default_ess_warning_fraction")]
    pub ess_warning_fraction: f64,
    /// Output directory configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_particles() -> usize {
    1000
}

fn default_ess_warning_fraction() -> f64 {
    0.1
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            particles: default_particles(),
            seed_policy: SeedPolicy::default(),
            rate_law: RateLaw::default(),
            model: ModelConfig::default(),
            ess_warning_fraction: default_ess_warning_fraction(),
            output: OutputConfig::default(),
        }
    }
}

impl RunConfig {
    /// Parses a configuration from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CsmcError> {
        serde_yaml::from_str(yaml).map_err(|err| {
            CsmcError::Config(ErrorInfo::new("config-parse", err.to_string()))
        })
    }

    /// Loads a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, CsmcError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            CsmcError::Serde(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&contents).map_err(|err| match err {
            CsmcError::Config(info) => {
                CsmcError::Config(info.with_context("path", path.display().to_string()))
            }
            other => other,
        })
    }

    /// Checks the configuration before any particle is created.
    pub fn validate(&self) -> Result<(), CsmcError> {
        if self.particles == 0 {
            return Err(CsmcError::Input(
                ErrorInfo::new("empty-population", "population size must be positive")
                    .with_hint("set `particles` to at least 1"),
            ));
        }
        if !(0.0..=1.0).contains(&self.ess_warning_fraction) {
            return Err(CsmcError::Config(
                ErrorInfo::new(
                    "ess-warning-fraction",
                    "ess_warning_fraction must lie in [0, 1]",
                )
                .with_context("value", self.ess_warning_fraction.to_string()),
            ));
        }
        self.model.validate()
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded in manifests.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Rate of the exponential height increment as a function of remaining lineages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateLaw {
    /// Number of lineage pairs, `n (n - 1) / 2`.
    #[default]
    Exact,
    /// Stirling-type bound on `C(n, 2)`: `(n/2 - 1/2)^2 e^2 / sqrt(4 pi)`.
    Stirling,
}

impl RateLaw {
    /// Rate for a forest holding `lineages` roots.
    pub fn rate(&self, lineages: usize) -> f64 {
        let n = lineages as f64;
        match self {
            RateLaw::Exact => n * (n - 1.0) / 2.0,
            RateLaw::Stirling => {
                let k = 2.0_f64;
                (n / k - 0.5).powi(2) * k.exp() / (2.0 * std::f64::consts::PI * k).sqrt()
            }
        }
    }
}

/// Output directory layout configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for run artefacts. Nothing is written when unset.
    #[serde(default)]
    pub run_directory: Option<PathBuf>,
    /// Tree list filename relative to `run_directory`.
    #[serde(default = "default_trees_filename")]
    pub trees_file: PathBuf,
    /// Metrics filename relative to `run_directory`.
    #[serde(default = "default_metrics_filename")]
    pub metrics_file: PathBuf,
    /// Summary filename relative to `run_directory`.
    #[serde(default = "default_summary_filename")]
    pub summary_file: PathBuf,
    /// Manifest filename relative to `run_directory`.
    #[serde(default = "default_manifest_filename")]
    pub manifest_file: PathBuf,
}

fn default_trees_filename() -> PathBuf {
    PathBuf::from("trees.nwk")
}

fn default_metrics_filename() -> PathBuf {
    PathBuf::from("metrics.csv")
}

fn default_summary_filename() -> PathBuf {
    PathBuf::from("summary.json")
}

fn default_manifest_filename() -> PathBuf {
    PathBuf::from("manifest.json")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            run_directory: None,
            trees_file: default_trees_filename(),
            metrics_file: default_metrics_filename(),
            summary_file: default_summary_filename(),
            manifest_file: default_manifest_filename(),
        }
    }
}
