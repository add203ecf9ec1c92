use std::sync::Arc;

use csmc_core::errors::ErrorInfo;
use csmc_core::{ChildPartial, CsmcError, LikelihoodOracle};

use crate::pool::{BufferPool, PooledBuffer};

/// Shared handle to an immutable tree fragment.
///
/// Any number of forests may hold the same fragment after resampling. The
/// fragment's pooled buffers go back to the pool when the last handle drops.
pub type NodeRef = Arc<TreeNode>;

/// One tip or internal vertex of a persistent tree.
#[derive(Debug)]
pub struct TreeNode {
    height: f64,
    log_likelihood: f64,
    body: NodeBody,
}

#[derive(Debug)]
enum NodeBody {
    Tip {
        index: usize,
        label: String,
    },
    Internal {
        clv: PooledBuffer<f64>,
        scale: PooledBuffer<u32>,
        left: TreeEdge,
        right: TreeEdge,
    },
}

/// Edge from a parent to one child, owning the transition matrix of that branch.
#[derive(Debug)]
pub struct TreeEdge {
    length: f64,
    pmatrix: PooledBuffer<f64>,
    child: NodeRef,
}

impl TreeEdge {
    /// Builds the edge from `child` up to a parent placed at `parent_height`.
    ///
    /// The branch length is fixed here, once, as `parent_height - child.height()`.
    pub fn new(
        pool: &BufferPool,
        oracle: &dyn LikelihoodOracle,
        child: NodeRef,
        parent_height: f64,
    ) -> Result<Self, CsmcError> {
        let length = parent_height - child.height;
        if !length.is_finite() || length < 0.0 {
            return Err(CsmcError::Invariant(
                ErrorInfo::new("negative-branch", "branch length must be finite and non-negative")
                    .with_context("parent_height", parent_height.to_string())
                    .with_context("child_height", child.height.to_string()),
            ));
        }
        let mut pmatrix = pool.acquire_pmatrix();
        oracle.update_pmatrix(length, &mut pmatrix);
        Ok(Self {
            length,
            pmatrix,
            child,
        })
    }

    /// Branch length of the edge.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Child node the edge points to.
    pub fn child(&self) -> &NodeRef {
        &self.child
    }

    /// Transition-probability buffer of the branch.
    pub fn pmatrix(&self) -> &[f64] {
        &self.pmatrix
    }

    fn partial<'a>(&'a self, oracle: &'a dyn LikelihoodOracle) -> ChildPartial<'a> {
        let (clv, scale) = self.child.partial(oracle);
        ChildPartial {
            clv,
            scale,
            pmatrix: &self.pmatrix,
        }
    }
}

impl TreeNode {
    /// Wraps a tip whose partial vector is owned by the oracle.
    ///
    /// Tips draw nothing from the pool and sit at height zero.
    pub fn tip(oracle: &dyn LikelihoodOracle, index: usize) -> Result<NodeRef, CsmcError> {
        if index >= oracle.tip_count() {
            return Err(CsmcError::Invariant(
                ErrorInfo::new("tip-out-of-range", "tip index exceeds the alignment size")
                    .with_context("index", index.to_string())
                    .with_context("tips", oracle.tip_count().to_string()),
            ));
        }
        Ok(Arc::new(Self {
            height: 0.0,
            log_likelihood: oracle.tip_log_likelihood(index),
            body: NodeBody::Tip {
                index,
                label: oracle.tip_label(index).to_string(),
            },
        }))
    }

    /// Builds an internal node above two edges and evaluates its likelihood.
    ///
    /// Acquires a partial vector and a scale buffer from `pool`, asks the oracle
    /// to combine both children into them, then caches the node's log-likelihood.
    pub fn internal(
        pool: &BufferPool,
        oracle: &dyn LikelihoodOracle,
        left: TreeEdge,
        right: TreeEdge,
        height: f64,
    ) -> Result<NodeRef, CsmcError> {
        for edge in [&left, &right] {
            if !(height > edge.child.height) {
                return Err(CsmcError::Invariant(
                    ErrorInfo::new(
                        "non-increasing-height",
                        "parent must sit strictly above both children",
                    )
                    .with_context("height", height.to_string())
                    .with_context("child_height", edge.child.height.to_string()),
                ));
            }
        }
        let mut clv = pool.acquire_clv();
        let mut scale = pool.acquire_scale();
        oracle.combine(left.partial(oracle), right.partial(oracle), &mut clv, &mut scale);
        let log_likelihood = oracle.log_likelihood(&clv, Some(&scale[..]));
        Ok(Arc::new(Self {
            height,
            log_likelihood,
            body: NodeBody::Internal {
                clv,
                scale,
                left,
                right,
            },
        }))
    }

    /// Height of the node on the forest clock.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Cached log-likelihood of the subtree rooted here.
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// Label of a tip; `None` for internal nodes.
    pub fn label(&self) -> Option<&str> {
        match &self.body {
            NodeBody::Tip { label, .. } => Some(label.as_str()),
            NodeBody::Internal { .. } => None,
        }
    }

    /// Whether the node is a tip.
    pub fn is_tip(&self) -> bool {
        matches!(self.body, NodeBody::Tip { .. })
    }

    /// Left and right edges of an internal node.
    pub fn edges(&self) -> Option<(&TreeEdge, &TreeEdge)> {
        match &self.body {
            NodeBody::Tip { .. } => None,
            NodeBody::Internal { left, right, .. } => Some((left, right)),
        }
    }

    /// Pooled scale counters of an internal node.
    pub fn scale(&self) -> Option<&[u32]> {
        match &self.body {
            NodeBody::Tip { .. } => None,
            NodeBody::Internal { scale, .. } => Some(&scale[..]),
        }
    }

    /// Partial vector and scale counters used by the oracle.
    pub fn partial<'a>(&'a self, oracle: &'a dyn LikelihoodOracle) -> (&'a [f64], Option<&'a [u32]>) {
        match &self.body {
            NodeBody::Tip { index, .. } => (oracle.tip_clv(*index), None),
            NodeBody::Internal { clv, scale, .. } => (&clv[..], Some(&scale[..])),
        }
    }

    /// Number of tips below (and including) this node.
    pub fn tip_count(&self) -> usize {
        match &self.body {
            NodeBody::Tip { .. } => 1,
            NodeBody::Internal { left, right, .. } => {
                left.child.tip_count() + right.child.tip_count()
            }
        }
    }

    /// Visits every node of the subtree in pre-order.
    pub fn visit<F: FnMut(&TreeNode)>(&self, visitor: &mut F) {
        visitor(self);
        if let NodeBody::Internal { left, right, .. } = &self.body {
            left.child.visit(visitor);
            right.child.visit(visitor);
        }
    }
}
