use std::collections::BTreeSet;
use std::sync::Arc;

use csmc_core::{BufferDims, ChildPartial, LikelihoodOracle, RngHandle};
use csmc_tree::{topology_hash, BufferKind, BufferPool, Forest, NodeRef, TreeNode};

struct FlatOracle {
    labels: Vec<String>,
    clv: Vec<f64>,
}

impl FlatOracle {
    fn new(tips: usize) -> Self {
        Self {
            labels: (0..tips).map(|i| format!("s{i}")).collect(),
            clv: vec![1.0; 4],
        }
    }
}

impl LikelihoodOracle for FlatOracle {
    fn dims(&self) -> BufferDims {
        BufferDims::for_partition(4, 1, 1)
    }

    fn tip_count(&self) -> usize {
        self.labels.len()
    }

    fn tip_label(&self, tip: usize) -> &str {
        &self.labels[tip]
    }

    fn tip_clv(&self, _tip: usize) -> &[f64] {
        &self.clv
    }

    fn tip_log_likelihood(&self, _tip: usize) -> f64 {
        0.0
    }

    fn update_pmatrix(&self, _branch_length: f64, pmatrix: &mut [f64]) {
        pmatrix.fill(0.25);
    }

    fn combine(
        &self,
        left: ChildPartial<'_>,
        right: ChildPartial<'_>,
        clv: &mut [f64],
        scale: &mut [u32],
    ) {
        for (slot, (l, r)) in clv.iter_mut().zip(left.clv.iter().zip(right.clv)) {
            *slot = l * r;
        }
        scale.fill(0);
    }

    fn log_likelihood(&self, clv: &[f64], _scale: Option<&[u32]>) -> f64 {
        clv.iter().sum::<f64>().ln()
    }
}

fn setup(tips: usize) -> (Arc<BufferPool>, Forest) {
    let oracle: Arc<dyn LikelihoodOracle> = Arc::new(FlatOracle::new(tips));
    let pool = BufferPool::new(oracle.dims());
    let forest = Forest::new(oracle, Arc::clone(&pool)).unwrap();
    (pool, forest)
}

/// Collects the storage addresses of every pooled buffer reachable from `roots`,
/// counting each shared node once.
fn live_buffers(oracle: &dyn LikelihoodOracle, roots: &[NodeRef]) -> Vec<(BufferKind, usize)> {
    let mut seen = BTreeSet::new();
    let mut buffers = Vec::new();
    for root in roots {
        root.visit(&mut |node: &TreeNode| {
            if !seen.insert(node as *const TreeNode as usize) {
                return;
            }
            if let (Some((left, right)), Some(scale)) = (node.edges(), node.scale()) {
                let (clv, _) = node.partial(oracle);
                buffers.push((BufferKind::Clv, clv.as_ptr() as usize));
                buffers.push((BufferKind::Scale, scale.as_ptr() as usize));
                buffers.push((BufferKind::PMatrix, left.pmatrix().as_ptr() as usize));
                buffers.push((BufferKind::PMatrix, right.pmatrix().as_ptr() as usize));
            }
        });
    }
    buffers
}

#[test]
fn cloned_forest_shares_roots_by_reference() {
    let (pool, mut source) = setup(4);
    source.connect(0, 1, 1.0).unwrap();
    let replica = source.clone();
    for (a, b) in source.roots().iter().zip(replica.roots()) {
        assert!(Arc::ptr_eq(a, b));
    }
    assert_eq!(pool.stats().outstanding(), 4);
}

#[test]
fn growing_a_clone_never_touches_the_source() {
    let (_pool, mut source) = setup(4);
    source.connect(0, 1, 1.0).unwrap();
    let shared = Arc::clone(&source.roots()[2]);
    let before_height = shared.height();
    let before_likelihood = shared.log_likelihood();

    let mut replica = source.clone();
    replica.connect(2, 1, 0.5).unwrap();
    replica.connect(0, 1, 0.5).unwrap();

    assert_eq!(source.root_count(), 3);
    assert!(replica.is_complete());
    assert!(Arc::ptr_eq(&source.roots()[2], &shared));
    assert_eq!(shared.height(), before_height);
    assert_eq!(shared.log_likelihood(), before_likelihood);
}

#[test]
fn shared_buffers_are_released_once_when_last_owner_drops() {
    let (pool, mut source) = setup(3);
    source.connect(0, 1, 1.0).unwrap();
    let mut replica = source.clone();
    replica.connect(0, 1, 1.0).unwrap();
    assert_eq!(pool.stats().outstanding(), 8);

    drop(source);
    // The first merge is still referenced by the replica's tree.
    assert_eq!(pool.stats().outstanding(), 8);

    drop(replica);
    let stats = pool.stats();
    assert_eq!(stats.outstanding(), 0);
    for kind in [BufferKind::Clv, BufferKind::PMatrix, BufferKind::Scale] {
        let counters = stats.for_kind(kind);
        assert_eq!(counters.acquired, counters.released);
        assert_eq!(counters.idle, counters.allocated);
    }
}

#[test]
fn no_buffer_is_handed_out_twice() {
    let (pool, forest) = setup(7);
    let mut population = vec![forest.clone(), forest.clone(), forest];
    let mut rng = RngHandle::from_seed(3);
    for step in 0..6 {
        for forest in population.iter_mut() {
            let (i, j) = rng.distinct_pair(forest.root_count()).unwrap();
            forest.connect(i, j, 0.1).unwrap();
        }
        // Replace one lineage with a copy of another, releasing whatever was unique to it.
        let source = step % population.len();
        let target = (step + 1) % population.len();
        population[target] = population[source].clone();

        let roots: Vec<NodeRef> = population
            .iter()
            .flat_map(|forest| forest.roots().iter().cloned())
            .collect();
        let buffers = live_buffers(population[0].oracle().as_ref(), &roots);
        let unique: BTreeSet<_> = buffers.iter().collect();
        assert_eq!(unique.len(), buffers.len());
        let stats = pool.stats();
        assert_eq!(
            stats.clv.outstanding() + stats.pmatrix.outstanding() + stats.scale.outstanding(),
            buffers.len()
        );
    }
    drop(population);
    assert_eq!(pool.stats().outstanding(), 0);
}

#[test]
fn topology_hash_ignores_branch_lengths_and_child_order() {
    let (_pool, mut a) = setup(3);
    let mut b = a.clone();
    a.connect(0, 1, 1.0).unwrap();
    a.connect(0, 1, 2.0).unwrap();
    b.connect(1, 0, 0.3).unwrap();
    b.connect(1, 0, 0.1).unwrap();
    let hash_a = topology_hash(a.tree().unwrap());
    let hash_b = topology_hash(b.tree().unwrap());
    assert_eq!(hash_a, hash_b);

    let (_pool, mut c) = setup(3);
    c.connect(1, 2, 1.0).unwrap();
    c.connect(0, 1, 1.0).unwrap();
    assert_ne!(hash_a, topology_hash(c.tree().unwrap()));
}
