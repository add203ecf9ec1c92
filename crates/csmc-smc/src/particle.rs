use csmc_core::errors::ErrorInfo;
use csmc_core::{CsmcError, RngHandle};
use csmc_tree::Forest;
use serde::{Deserialize, Serialize};

/// Record of one merge performed by [`Particle::propose`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProposalOutcome {
    /// Index of the root that became the left child.
    pub left: usize,
    /// Index of the root that became the right child.
    pub right: usize,
    /// Height increment drawn for the merge.
    pub height_delta: f64,
    /// Forest clock after the merge.
    pub height: f64,
    /// Incremental log-likelihood added to the weight.
    pub likelihood_factor: f64,
    /// Log-weight after the update.
    pub log_weight: f64,
}

/// One weighted hypothesis: a forest, its weights and its own random stream.
#[derive(Debug)]
pub struct Particle {
    log_weight: f64,
    normalized_weight: f64,
    forest: Forest,
    rng: RngHandle,
}

impl Particle {
    /// Creates a particle around `forest` with its random stream seeded from `seed`.
    pub fn new(forest: Forest, log_weight: f64, seed: u64) -> Self {
        Self {
            log_weight,
            normalized_weight: log_weight.exp(),
            forest,
            rng: RngHandle::from_seed(seed),
        }
    }

    /// Merges two uniformly chosen roots and adds the merge's likelihood factor
    /// to the log-weight.
    ///
    /// The height increment is drawn from an exponential distribution with the
    /// given `rate`.
    pub fn propose(&mut self, rate: f64) -> Result<ProposalOutcome, CsmcError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(CsmcError::Invariant(
                ErrorInfo::new("proposal-rate", "proposal rate must be finite and positive")
                    .with_context("rate", rate.to_string()),
            ));
        }
        let Some((left, right)) = self.rng.distinct_pair(self.forest.root_count()) else {
            return Err(CsmcError::Invariant(
                ErrorInfo::new("complete-forest", "no merge is possible on a single root")
                    .with_context("roots", self.forest.root_count().to_string()),
            ));
        };
        let height_delta = self.rng.exponential(rate)?;
        let node = self.forest.connect(left, right, height_delta)?;
        let likelihood_factor = self.forest.likelihood_factor(&node)?;
        let log_weight = self.log_weight + likelihood_factor;
        if !log_weight.is_finite() {
            return Err(CsmcError::Invariant(
                ErrorInfo::new("non-finite-weight", "particle log-weight is not finite")
                    .with_context("previous", self.log_weight.to_string())
                    .with_context("likelihood_factor", likelihood_factor.to_string())
                    .with_hint("check the input for sequences the model cannot explain"),
            ));
        }
        self.log_weight = log_weight;
        Ok(ProposalOutcome {
            left,
            right,
            height_delta,
            height: self.forest.height(),
            likelihood_factor,
            log_weight,
        })
    }

    /// Copy sharing every root of this particle's forest, with a fresh random
    /// stream seeded from `seed`. Both weights are copied.
    pub fn replicate(&self, seed: u64) -> Self {
        Self {
            log_weight: self.log_weight,
            normalized_weight: self.normalized_weight,
            forest: self.forest.clone(),
            rng: RngHandle::from_seed(seed),
        }
    }

    /// Unnormalised log-weight.
    pub fn log_weight(&self) -> f64 {
        self.log_weight
    }

    /// Weight relative to the population after the last normalisation.
    pub fn normalized_weight(&self) -> f64 {
        self.normalized_weight
    }

    pub(crate) fn set_normalized_weight(&mut self, weight: f64) {
        self.normalized_weight = weight;
    }

    /// Forest carried by the particle.
    pub fn forest(&self) -> &Forest {
        &self.forest
    }
}
