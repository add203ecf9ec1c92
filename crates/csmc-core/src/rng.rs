//! Deterministic RNG wrapper and seed-derivation helpers.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Distribution, Exp};
use siphasher::sip::SipHasher13;
use std::hash::Hasher;

use crate::errors::{CsmcError, ErrorInfo};

/// Deterministic RNG handle carried by every particle and by the driver.
///
/// The handle is a thin wrapper around `StdRng` that documents the seeding
/// policy used throughout the project. A master `seed: u64` must be provided by
/// the caller. Substreams are derived by hashing `(master_seed, substream_id)`
/// with SipHash-1-3 configured with fixed zero keys. Replicated particles get a
/// freshly derived substream instead of a copy of their source's state, so
/// descendants of one particle diverge.
#[derive(Debug, Clone)]
pub struct RngHandle {
    rng: StdRng,
}

impl RngHandle {
    /// Creates a new RNG handle from a master seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draws two distinct indices uniformly without replacement from `0..len`.
    ///
    /// Returns `None` when fewer than two indices are available.
    pub fn distinct_pair(&mut self, len: usize) -> Option<(usize, usize)> {
        if len < 2 {
            return None;
        }
        let first = self.rng.gen_range(0..len);
        let mut second = self.rng.gen_range(0..len - 1);
        if second >= first {
            second += 1;
        }
        Some((first, second))
    }

    /// Draws from an exponential distribution with the given rate.
    ///
    /// The rate must be finite and positive. A draw of exactly zero is
    /// rejected and redrawn, so the result is always strictly positive.
    pub fn exponential(&mut self, rate: f64) -> Result<f64, CsmcError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(CsmcError::Rng(
                ErrorInfo::new("exponential-rate", "exponential rate must be finite and positive")
                    .with_context("rate", rate.to_string()),
            ));
        }
        let law = Exp::new(rate).map_err(|err| {
            CsmcError::Rng(
                ErrorInfo::new("exponential-rate", err.to_string())
                    .with_context("rate", rate.to_string()),
            )
        })?;
        loop {
            let draw = law.sample(&mut self.rng);
            if draw > 0.0 {
                return Ok(draw);
            }
        }
    }
}

impl RngCore for RngHandle {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

/// Derives the deterministic seed for a specific substream.
pub fn derive_substream_seed(master_seed: u64, substream: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(substream);
    hasher.finish()
}
