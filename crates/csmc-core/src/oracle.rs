//! Contract between the forest engine and the substitution-model likelihood kernel.

use serde::{Deserialize, Serialize};

/// Fixed buffer lengths for one run.
///
/// Every pooled buffer of a given kind has exactly this many elements for the
/// whole lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferDims {
    /// Length of a conditional-likelihood vector.
    pub clv_len: usize,
    /// Length of a transition-probability matrix block.
    pub pmatrix_len: usize,
    /// Length of a per-node scale buffer.
    pub scale_len: usize,
}

impl BufferDims {
    /// Derives buffer lengths from the partition shape.
    ///
    /// Scaling is tracked per site, so the scale buffer length equals `sites`.
    pub const fn for_partition(states: usize, sites: usize, rate_categories: usize) -> Self {
        Self {
            clv_len: sites * rate_categories * states,
            pmatrix_len: rate_categories * states * states,
            scale_len: sites,
        }
    }
}

/// Read-only view of one child handed to [`LikelihoodOracle::combine`].
#[derive(Debug, Clone, Copy)]
pub struct ChildPartial<'a> {
    /// Conditional-likelihood vector of the child.
    pub clv: &'a [f64],
    /// Scale counters of the child; tips carry none.
    pub scale: Option<&'a [u32]>,
    /// Transition-probability matrix of the edge leading to the child.
    pub pmatrix: &'a [f64],
}

/// Likelihood kernel consumed by the forest.
///
/// Implementations are pure functions of their numeric inputs and must fully
/// overwrite every output slice they are handed: pooled buffers are recycled
/// without zeroing.
pub trait LikelihoodOracle: Send + Sync {
    /// Returns the fixed buffer lengths for this run.
    fn dims(&self) -> BufferDims;

    /// Returns the number of tips (input sequences).
    fn tip_count(&self) -> usize;

    /// Returns the label of the given tip.
    fn tip_label(&self, tip: usize) -> &str;

    /// Returns the precomputed read-only partial vector of the given tip.
    fn tip_clv(&self, tip: usize) -> &[f64];

    /// Returns the precomputed log-likelihood of the given tip.
    fn tip_log_likelihood(&self, tip: usize) -> f64;

    /// Fills `pmatrix` with the transition probabilities for `branch_length`.
    fn update_pmatrix(&self, branch_length: f64, pmatrix: &mut [f64]);

    /// Combines two children into a parent partial vector and scale buffer.
    fn combine(
        &self,
        left: ChildPartial<'_>,
        right: ChildPartial<'_>,
        clv: &mut [f64],
        scale: &mut [u32],
    );

    /// Computes the log-likelihood of a subtree from its root partial vector.
    fn log_likelihood(&self, clv: &[f64], scale: Option<&[u32]>) -> f64;
}
