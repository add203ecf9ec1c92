use csmc_core::errors::ErrorInfo;
use csmc_core::{CsmcError, NUCLEOTIDE_STATES};
use serde::{Deserialize, Serialize};

/// Substitution model parameters for a run.
///
/// The defaults describe an equal-input (F81) nucleotide model with skewed base
/// frequencies and four discrete-gamma rate categories (shape 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Stationary frequencies of A, C, G and T.
    #[serde(default = "default_frequencies")]
    pub frequencies: [f64; NUCLEOTIDE_STATES],
    /// Relative rate of every category; categories are weighted equally.
    #[serde(default = "default_category_rates")]
    pub category_rates: Vec<f64>,
}

fn default_frequencies() -> [f64; NUCLEOTIDE_STATES] {
    [0.17, 0.19, 0.25, 0.39]
}

fn default_category_rates() -> Vec<f64> {
    vec![
        0.136_953_782_671_401_07,
        0.476_751_856_176_651_89,
        0.999_999_999_979_584_22,
        2.386_294_361_172_362_6,
    ]
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            frequencies: default_frequencies(),
            category_rates: default_category_rates(),
        }
    }
}

impl ModelConfig {
    /// Checks that frequencies form a distribution and rates are positive.
    pub fn validate(&self) -> Result<(), CsmcError> {
        if self
            .frequencies
            .iter()
            .any(|&freq| !freq.is_finite() || freq <= 0.0)
        {
            return Err(CsmcError::Config(
                ErrorInfo::new("model-frequencies", "frequencies must be positive")
                    .with_context("frequencies", format!("{:?}", self.frequencies)),
            ));
        }
        let total: f64 = self.frequencies.iter().sum();
        if (total - 1.0).abs() > 1e-6 {
            return Err(CsmcError::Config(
                ErrorInfo::new("model-frequencies", "frequencies must sum to one")
                    .with_context("sum", total.to_string()),
            ));
        }
        if self.category_rates.is_empty() {
            return Err(CsmcError::Config(ErrorInfo::new(
                "model-categories",
                "at least one rate category is required",
            )));
        }
        if self
            .category_rates
            .iter()
            .any(|&rate| !rate.is_finite() || rate <= 0.0)
        {
            return Err(CsmcError::Config(
                ErrorInfo::new("model-categories", "category rates must be positive")
                    .with_context("rates", format!("{:?}", self.category_rates)),
            ));
        }
        Ok(())
    }
}

/// Equal-input nucleotide model evaluated across discrete rate categories.
///
/// `P_ij(t) = pi_j + (delta_ij - pi_j) * exp(-beta * r * t)` with
/// `beta = 1 / (1 - sum pi^2)`, which normalises the mean substitution rate to one.
#[derive(Debug, Clone, PartialEq)]
pub struct NucleotideModel {
    frequencies: [f64; NUCLEOTIDE_STATES],
    rates: Vec<f64>,
    weights: Vec<f64>,
    beta: f64,
}

impl NucleotideModel {
    /// Builds the model after validating its parameters.
    pub fn new(config: &ModelConfig) -> Result<Self, CsmcError> {
        config.validate()?;
        let homozygosity: f64 = config.frequencies.iter().map(|f| f * f).sum();
        let weight = 1.0 / config.category_rates.len() as f64;
        Ok(Self {
            frequencies: config.frequencies,
            rates: config.category_rates.clone(),
            weights: vec![weight; config.category_rates.len()],
            beta: 1.0 / (1.0 - homozygosity),
        })
    }

    /// Stationary frequencies.
    pub fn frequencies(&self) -> &[f64; NUCLEOTIDE_STATES] {
        &self.frequencies
    }

    /// Number of rate categories.
    pub fn category_count(&self) -> usize {
        self.rates.len()
    }

    /// Mixture weight of every rate category.
    pub fn category_weights(&self) -> &[f64] {
        &self.weights
    }

    /// Writes one `states x states` block per rate category into `out`.
    pub fn fill_pmatrix(&self, branch_length: f64, out: &mut [f64]) {
        let span = NUCLEOTIDE_STATES * NUCLEOTIDE_STATES;
        for (block, &rate) in out.chunks_exact_mut(span).zip(&self.rates) {
            let decay = (-self.beta * rate * branch_length).exp();
            for from in 0..NUCLEOTIDE_STATES {
                for to in 0..NUCLEOTIDE_STATES {
                    let stay = if from == to { 1.0 } else { 0.0 };
                    let freq = self.frequencies[to];
                    block[from * NUCLEOTIDE_STATES + to] = freq + (stay - freq) * decay;
                }
            }
        }
    }
}
