use csmc_core::{BufferDims, ChildPartial, LikelihoodOracle, NUCLEOTIDE_STATES};

use crate::alignment::Alignment;
use crate::model::NucleotideModel;

/// Sites whose largest entry falls below this value are rescaled.
pub const SCALE_THRESHOLD: f64 = 8.636_168_555_094_445e-78;
/// Multiplier applied to a rescaled site (the inverse of [`SCALE_THRESHOLD`]).
pub const SCALE_FACTOR: f64 = 1.157_920_892_373_162e77;
/// Number of binary orders of magnitude removed by one rescaling.
const SCALE_EXPONENT: i32 = 256;

/// Built-in likelihood oracle evaluating Felsenstein pruning steps.
///
/// Tip partial vectors and tip log-likelihoods are computed once at
/// construction; internal partial vectors live in pooled buffers owned by the
/// forest.
#[derive(Debug, Clone)]
pub struct PruningOracle {
    alignment: Alignment,
    model: NucleotideModel,
    dims: BufferDims,
    tip_clvs: Vec<Box<[f64]>>,
    tip_log_likelihoods: Vec<f64>,
}

impl PruningOracle {
    /// Precomputes tip partial vectors for `alignment` under `model`.
    pub fn new(alignment: Alignment, model: NucleotideModel) -> Self {
        let categories = model.category_count();
        let sites = alignment.site_count();
        let dims = BufferDims::for_partition(NUCLEOTIDE_STATES, sites, categories);

        let tip_clvs: Vec<Box<[f64]>> = (0..alignment.tip_count())
            .map(|tip| {
                let mut clv = vec![0.0; dims.clv_len];
                for (site, &mask) in alignment.masks(tip).iter().enumerate() {
                    for category in 0..categories {
                        let offset = (site * categories + category) * NUCLEOTIDE_STATES;
                        for state in 0..NUCLEOTIDE_STATES {
                            clv[offset + state] = f64::from((mask >> state) & 1);
                        }
                    }
                }
                clv.into_boxed_slice()
            })
            .collect();

        let mut oracle = Self {
            alignment,
            model,
            dims,
            tip_clvs,
            tip_log_likelihoods: Vec::new(),
        };
        oracle.tip_log_likelihoods = oracle
            .tip_clvs
            .iter()
            .map(|clv| oracle.log_likelihood(clv, None))
            .collect();
        tracing::debug!(
            tips = oracle.alignment.tip_count(),
            sites,
            categories,
            "pruning oracle ready"
        );
        oracle
    }

    fn categories(&self) -> usize {
        self.model.category_count()
    }
}

fn child_sum(pmatrix: &[f64], clv: &[f64], from: usize) -> f64 {
    let row = &pmatrix[from * NUCLEOTIDE_STATES..(from + 1) * NUCLEOTIDE_STATES];
    row.iter().zip(clv).map(|(p, l)| p * l).sum()
}

impl LikelihoodOracle for PruningOracle {
    fn dims(&self) -> BufferDims {
        self.dims
    }

    fn tip_count(&self) -> usize {
        self.alignment.tip_count()
    }

    fn tip_label(&self, tip: usize) -> &str {
        &self.alignment.labels()[tip]
    }

    fn tip_clv(&self, tip: usize) -> &[f64] {
        &self.tip_clvs[tip]
    }

    fn tip_log_likelihood(&self, tip: usize) -> f64 {
        self.tip_log_likelihoods[tip]
    }

    fn update_pmatrix(&self, branch_length: f64, pmatrix: &mut [f64]) {
        self.model.fill_pmatrix(branch_length, pmatrix);
    }

    fn combine(
        &self,
        left: ChildPartial<'_>,
        right: ChildPartial<'_>,
        clv: &mut [f64],
        scale: &mut [u32],
    ) {
        let categories = self.categories();
        let span = NUCLEOTIDE_STATES * NUCLEOTIDE_STATES;
        let site_len = categories * NUCLEOTIDE_STATES;

        for (site, slot) in scale.iter_mut().enumerate() {
            let site_range = site * site_len..(site + 1) * site_len;
            let mut site_max = 0.0_f64;
            for category in 0..categories {
                let offset = site_range.start + category * NUCLEOTIDE_STATES;
                let states = offset..offset + NUCLEOTIDE_STATES;
                let p_left = &left.pmatrix[category * span..(category + 1) * span];
                let p_right = &right.pmatrix[category * span..(category + 1) * span];
                let c_left = &left.clv[states.clone()];
                let c_right = &right.clv[states];
                for from in 0..NUCLEOTIDE_STATES {
                    let value =
                        child_sum(p_left, c_left, from) * child_sum(p_right, c_right, from);
                    clv[offset + from] = value;
                    site_max = site_max.max(value);
                }
            }

            let mut count = left.scale.map_or(0, |s| s[site]) + right.scale.map_or(0, |s| s[site]);
            if site_max < SCALE_THRESHOLD {
                for value in &mut clv[site_range] {
                    *value *= SCALE_FACTOR;
                }
                count += 1;
            }
            *slot = count;
        }
    }

    fn log_likelihood(&self, clv: &[f64], scale: Option<&[u32]>) -> f64 {
        let categories = self.categories();
        let frequencies = self.model.frequencies();
        let weights = self.model.category_weights();
        let site_len = categories * NUCLEOTIDE_STATES;
        let ln_threshold = -f64::from(SCALE_EXPONENT) * std::f64::consts::LN_2;

        clv.chunks_exact(site_len)
            .enumerate()
            .map(|(site, block)| {
                let likelihood: f64 = block
                    .chunks_exact(NUCLEOTIDE_STATES)
                    .zip(weights)
                    .map(|(states, weight)| {
                        weight
                            * states
                                .iter()
                                .zip(frequencies)
                                .map(|(l, f)| l * f)
                                .sum::<f64>()
                    })
                    .sum();
                let scalings = scale.map_or(0, |s| s[site]);
                likelihood.ln() + f64::from(scalings) * ln_threshold
            })
            .sum()
    }
}
