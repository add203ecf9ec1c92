use std::fmt;
use std::sync::Arc;

use csmc_core::errors::ErrorInfo;
use csmc_core::{CsmcError, LikelihoodOracle};

use crate::node::{NodeRef, TreeEdge, TreeNode};
use crate::pool::BufferPool;

/// Mutable per-particle state: the current roots plus the forest clock.
///
/// Cloning a forest shares every root fragment by reference. Growth happens
/// only through [`Forest::connect`], which adds a new parent and never edits
/// an existing node, so clones can keep reading fragments they share.
#[derive(Clone)]
pub struct Forest {
    height: f64,
    roots: Vec<NodeRef>,
    tip_count: usize,
    oracle: Arc<dyn LikelihoodOracle>,
    pool: Arc<BufferPool>,
}

impl Forest {
    /// Creates a forest holding one tip root per sequence known to the oracle.
    pub fn new(
        oracle: Arc<dyn LikelihoodOracle>,
        pool: Arc<BufferPool>,
    ) -> Result<Self, CsmcError> {
        if pool.dims() != oracle.dims() {
            return Err(CsmcError::Invariant(
                ErrorInfo::new("pool-dims", "buffer pool is sized for a different partition")
                    .with_context("pool", format!("{:?}", pool.dims()))
                    .with_context("oracle", format!("{:?}", oracle.dims())),
            ));
        }
        let tip_count = oracle.tip_count();
        if tip_count == 0 {
            return Err(CsmcError::Input(ErrorInfo::new(
                "empty-forest",
                "a forest needs at least one tip",
            )));
        }
        let roots = (0..tip_count)
            .map(|index| TreeNode::tip(oracle.as_ref(), index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            height: 0.0,
            roots,
            tip_count,
            oracle,
            pool,
        })
    }

    /// Merges roots `i` and `j` under a new parent placed `height_delta` above
    /// the current clock.
    ///
    /// Root `i` becomes the left child and root `j` the right child. Both are
    /// removed from the root list (higher index first) and the new node is
    /// appended last. On error the forest is left untouched.
    pub fn connect(&mut self, i: usize, j: usize, height_delta: f64) -> Result<NodeRef, CsmcError> {
        let count = self.roots.len();
        if count <= 1 {
            return Err(CsmcError::Invariant(
                ErrorInfo::new("complete-forest", "cannot merge a forest with a single root")
                    .with_context("roots", count.to_string()),
            ));
        }
        if i == j {
            return Err(CsmcError::Invariant(
                ErrorInfo::new("self-merge", "cannot merge a root with itself")
                    .with_context("index", i.to_string()),
            ));
        }
        if i >= count || j >= count {
            return Err(CsmcError::Invariant(
                ErrorInfo::new("root-out-of-range", "root index out of bounds")
                    .with_context("i", i.to_string())
                    .with_context("j", j.to_string())
                    .with_context("roots", count.to_string()),
            ));
        }
        if !height_delta.is_finite() || height_delta <= 0.0 {
            return Err(CsmcError::Invariant(
                ErrorInfo::new("height-delta", "height increment must be finite and positive")
                    .with_context("height_delta", height_delta.to_string()),
            ));
        }

        let height = self.height + height_delta;
        let oracle = self.oracle.as_ref();
        let left = TreeEdge::new(&self.pool, oracle, Arc::clone(&self.roots[i]), height)?;
        let right = TreeEdge::new(&self.pool, oracle, Arc::clone(&self.roots[j]), height)?;
        let node = TreeNode::internal(&self.pool, oracle, left, right, height)?;

        self.height = height;
        let (high, low) = if i > j { (i, j) } else { (j, i) };
        self.roots.remove(high);
        self.roots.remove(low);
        self.roots.push(Arc::clone(&node));
        tracing::trace!(i, j, height, roots = self.roots.len(), "connected roots");
        Ok(node)
    }

    /// Incremental log-likelihood contributed by the merge that created `node`:
    /// `ln L(node) - (ln L(left) + ln L(right))`.
    pub fn likelihood_factor(&self, node: &TreeNode) -> Result<f64, CsmcError> {
        let Some((left, right)) = node.edges() else {
            return Err(CsmcError::invariant(
                "tip-likelihood-factor",
                "likelihood factor is only defined for internal nodes",
            ));
        };
        Ok(node.log_likelihood()
            - (left.child().log_likelihood() + right.child().log_likelihood()))
    }

    /// Current roots in insertion order.
    pub fn roots(&self) -> &[NodeRef] {
        &self.roots
    }

    /// Number of current roots.
    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Number of tips the forest was created with.
    pub fn tip_count(&self) -> usize {
        self.tip_count
    }

    /// Number of merges performed so far.
    pub fn merges_performed(&self) -> usize {
        self.tip_count - self.roots.len()
    }

    /// Whether the forest has collapsed into a single tree.
    pub fn is_complete(&self) -> bool {
        self.roots.len() == 1
    }

    /// Current value of the forest clock.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Sum of the cached log-likelihoods of every root.
    pub fn log_likelihood(&self) -> f64 {
        self.roots.iter().map(|root| root.log_likelihood()).sum()
    }

    /// The single tree of a complete forest.
    pub fn tree(&self) -> Option<&NodeRef> {
        if self.is_complete() {
            self.roots.first()
        } else {
            None
        }
    }

    /// Likelihood oracle shared by every forest of the run.
    pub fn oracle(&self) -> &Arc<dyn LikelihoodOracle> {
        &self.oracle
    }

    /// Buffer pool shared by every forest of the run.
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }
}

impl fmt::Debug for Forest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forest")
            .field("height", &self.height)
            .field("roots", &self.roots.len())
            .field("tip_count", &self.tip_count)
            .finish_non_exhaustive()
    }
}
