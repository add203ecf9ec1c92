use std::sync::Arc;

use csmc_core::{BufferDims, ChildPartial, LikelihoodOracle, RngHandle};
use csmc_tree::{BufferPool, Forest, TreeNode};
use proptest::prelude::*;

/// Oracle whose log-likelihood is minus the tip index sum minus the total branch length.
struct LedgerOracle {
    labels: Vec<String>,
    clvs: Vec<[f64; 2]>,
}

impl LedgerOracle {
    fn new(tips: usize) -> Self {
        Self {
            labels: (0..tips).map(|i| format!("t{i}")).collect(),
            clvs: (0..tips).map(|i| [i as f64, 0.0]).collect(),
        }
    }
}

impl LikelihoodOracle for LedgerOracle {
    fn dims(&self) -> BufferDims {
        BufferDims {
            clv_len: 2,
            pmatrix_len: 1,
            scale_len: 1,
        }
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

    fn tip_log_likelihood(&self, tip: usize) -> f64 {
        -(tip as f64)
    }

    fn update_pmatrix(&self, branch_length: f64, pmatrix: &mut [f64]) {
        pmatrix[0] = branch_length;
    }

    fn combine(
        &self,
        left: ChildPartial<'_>,
        right: ChildPartial<'_>,
        clv: &mut [f64],
        scale: &mut [u32],
    ) {
        clv[0] = left.clv[0] + right.clv[0];
        clv[1] = left.clv[1] + right.clv[1] + left.pmatrix[0] + right.pmatrix[0];
        scale[0] = 0;
    }

    fn log_likelihood(&self, clv: &[f64], _scale: Option<&[u32]>) -> f64 {
        -clv[0] - clv[1]
    }
}

fn forest(tips: usize) -> Forest {
    let oracle: Arc<dyn LikelihoodOracle> = Arc::new(LedgerOracle::new(tips));
    let pool = BufferPool::new(oracle.dims());
    Forest::new(oracle, pool).unwrap()
}

fn check_subtree(node: &TreeNode) {
    if let Some((left, right)) = node.edges() {
        for edge in [left, right] {
            let child = edge.child();
            assert!(node.height() > child.height());
            assert!(edge.length() >= 0.0);
            assert!((edge.length() - (node.height() - child.height())).abs() < 1e-12);
            check_subtree(child);
        }
    } else {
        assert_eq!(node.height(), 0.0);
    }
}

#[test]
fn new_forest_holds_one_tip_per_sequence() {
    let forest = forest(5);
    assert_eq!(forest.root_count(), 5);
    assert_eq!(forest.merges_performed(), 0);
    assert_eq!(forest.height(), 0.0);
    let labels: Vec<_> = forest.roots().iter().map(|r| r.label().unwrap()).collect();
    assert_eq!(labels, vec!["t0", "t1", "t2", "t3", "t4"]);
    assert!(forest.tree().is_none());
}

#[test]
fn connect_replaces_two_roots_with_their_parent() {
    let mut forest = forest(4);
    let node = forest.connect(3, 1, 0.5).unwrap();
    assert_eq!(forest.root_count(), 3);
    let labels: Vec<_> = forest.roots()[..2]
        .iter()
        .map(|r| r.label().unwrap())
        .collect();
    assert_eq!(labels, vec!["t0", "t2"]);
    assert!(Arc::ptr_eq(&forest.roots()[2], &node));

    let (left, right) = node.edges().unwrap();
    assert_eq!(left.child().label(), Some("t3"));
    assert_eq!(right.child().label(), Some("t1"));
    assert_eq!(left.length(), 0.5);
    assert_eq!(node.height(), 0.5);
    assert_eq!(forest.height(), 0.5);
}

#[test]
fn likelihood_factor_is_the_merge_increment() {
    let mut forest = forest(3);
    let node = forest.connect(1, 2, 0.25).unwrap();
    // ln L(node) = -(1 + 2) - 0.5, children contribute -1 and -2.
    let factor = forest.likelihood_factor(&node).unwrap();
    assert!((factor - (-0.5)).abs() < 1e-12);
    assert_eq!(factor, forest.likelihood_factor(&node).unwrap());
}

#[test]
fn likelihood_factor_rejects_tips() {
    let forest = forest(2);
    let tip = Arc::clone(&forest.roots()[0]);
    let err = forest.likelihood_factor(&tip).unwrap_err();
    assert!(err.is_invariant());
}

#[test]
fn invalid_merges_leave_the_forest_untouched() {
    let mut forest = forest(3);
    assert_eq!(forest.connect(1, 1, 1.0).unwrap_err().info().code, "self-merge");
    assert_eq!(forest.connect(0, 3, 1.0).unwrap_err().info().code, "root-out-of-range");
    assert_eq!(forest.connect(0, 1, -1.0).unwrap_err().info().code, "height-delta");
    assert_eq!(forest.connect(0, 1, 0.0).unwrap_err().info().code, "height-delta");
    assert_eq!(forest.connect(0, 1, f64::NAN).unwrap_err().info().code, "height-delta");
    assert_eq!(forest.root_count(), 3);
    assert_eq!(forest.height(), 0.0);
    assert_eq!(forest.pool().stats().outstanding(), 0);
}

#[test]
fn complete_forest_accepts_no_merge() {
    let mut forest = forest(2);
    forest.connect(0, 1, 1.0).unwrap();
    assert!(forest.is_complete());
    let err = forest.connect(0, 1, 1.0).unwrap_err();
    assert_eq!(err.info().code, "complete-forest");
    assert_eq!(forest.tree().unwrap().tip_count(), 2);
}

proptest! {
    #[test]
    fn random_merges_preserve_invariants(seed in any::<u64>(), tips in 2usize..12) {
        let mut forest = forest(tips);
        let mut rng = RngHandle::from_seed(seed);
        let mut previous_height = forest.height();
        while !forest.is_complete() {
            let (i, j) = rng.distinct_pair(forest.root_count()).unwrap();
            let delta = rng.exponential(1.0).unwrap();
            let node = forest.connect(i, j, delta).unwrap();
            prop_assert!(forest.height() > previous_height);
            previous_height = forest.height();
            prop_assert_eq!(forest.root_count() + forest.merges_performed(), tips);
            prop_assert!(forest.likelihood_factor(&node).unwrap().is_finite());
            for root in forest.roots() {
                check_subtree(root);
            }
        }
        let tree = forest.tree().unwrap();
        prop_assert_eq!(tree.tip_count(), tips);
        prop_assert_eq!(forest.pool().stats().outstanding(), 4 * (tips - 1));
    }
}
