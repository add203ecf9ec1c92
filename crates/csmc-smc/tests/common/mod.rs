#![allow(dead_code)]

use std::sync::Arc;

use csmc_core::{BufferDims, ChildPartial, LikelihoodOracle};
use csmc_lik::{Alignment, SequenceRecord};
use csmc_smc::RunConfig;

/// Single-site oracle: merging identical subtrees has likelihood 1, anything
/// else 0.5. The scale slot counts mismatched merges below a node.
pub struct MismatchOracle {
    labels: Vec<String>,
    clvs: Vec<[f64; 4]>,
}

impl MismatchOracle {
    pub fn new(states: &[char]) -> Self {
        let clvs = states
            .iter()
            .map(|state| {
                let mut clv = [0.0; 4];
                let slot = match state {
                    'A' => 0,
                    'C' => 1,
                    'G' => 2,
                    _ => 3,
                };
                clv[slot] = 1.0;
                clv
            })
            .collect();
        Self {
            labels: (0..states.len()).map(|i| format!("s{i}")).collect(),
            clvs,
        }
    }

    pub fn shared(states: &[char]) -> Arc<dyn LikelihoodOracle> {
        Arc::new(Self::new(states))
    }
}

impl LikelihoodOracle for MismatchOracle {
    fn dims(&self) -> BufferDims {
        BufferDims::for_partition(4, 1, 1)
    }

    fn tip_count(&self) -> usize {
        self.labels.len()
    }

    fn tip_label(&self, tip: usize) -> &str {
        &self.labels[tip]
    }

    fn tip_clv(&self, tip: usize) -> &[f64] {
        &self.clvs[tip]
    }

    fn tip_log_likelihood(&self, _tip: usize) -> f64 {
        0.0
    }

    fn update_pmatrix(&self, branch_length: f64, pmatrix: &mut [f64]) {
        pmatrix.fill(branch_length);
    }

    fn combine(
        &self,
        left: ChildPartial<'_>,
        right: ChildPartial<'_>,
        clv: &mut [f64],
        scale: &mut [u32],
    ) {
        let mismatch = u32::from(left.clv != right.clv);
        for (slot, (l, r)) in clv.iter_mut().zip(left.clv.iter().zip(right.clv)) {
            *slot = l.max(*r);
        }
        scale[0] = left.scale.map_or(0, |s| s[0]) + right.scale.map_or(0, |s| s[0]) + mismatch;
    }

    fn log_likelihood(&self, _clv: &[f64], scale: Option<&[u32]>) -> f64 {
        f64::from(scale.map_or(0, |s| s[0])) * 0.5_f64.ln()
    }
}

pub fn config(particles: usize, seed: u64) -> RunConfig {
    let mut config = RunConfig::default();
    config.particles = particles;
    config.seed_policy.master_seed = seed;
    config
}

pub fn alignment(rows: &[(&str, &str)]) -> Alignment {
    Alignment::new(
        rows.iter()
            .map(|(label, seq)| SequenceRecord::new(*label, *seq))
            .collect(),
    )
    .unwrap()
}

pub fn primates() -> Alignment {
    alignment(&[
        ("human", "ACGTACGTTAGCCGATAGCT"),
        ("chimp", "ACGTACGTTAGCCGATAGCA"),
        ("gorilla", "ACGTACGATAGCCGTTAGCA"),
        ("orangutan", "ACCTACGATAGGCGTTAGCA"),
        ("gibbon", "TCCTACGATAGGCGTTACCA"),
    ])
}
