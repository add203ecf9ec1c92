//! Free-list recycler for the fixed-size numeric buffers attached to nodes and edges.
//!
//! One [`BufferPool`] exists per run. Buffers are handed out as
//! [`PooledBuffer`] guards which push their storage back onto the free-list
//! they came from when dropped, so every acquisition is matched by exactly one
//! release. Contents are never zeroed on reuse.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use csmc_core::BufferDims;
use serde::{Deserialize, Serialize};

/// Kind of pooled buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BufferKind {
    /// Conditional-likelihood vector owned by an internal node.
    Clv,
    /// Transition-probability matrix owned by an edge.
    PMatrix,
    /// Per-site scale counters owned by an internal node.
    Scale,
}

impl BufferKind {
    /// Stable lowercase name used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            BufferKind::Clv => "clv",
            BufferKind::PMatrix => "pmatrix",
            BufferKind::Scale => "scale",
        }
    }
}

/// Counters captured from one free-list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeListStats {
    /// Buffers allocated fresh because the free-list was empty.
    pub allocated: usize,
    /// Total acquisitions (fresh or recycled).
    pub acquired: usize,
    /// Total releases back onto the free-list.
    pub released: usize,
    /// Buffers currently parked on the free-list.
    pub idle: usize,
}

impl FreeListStats {
    /// Buffers currently handed out and not yet released.
    pub fn outstanding(&self) -> usize {
        self.acquired - self.released
    }
}

/// Snapshot of the counters of every free-list in a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Conditional-likelihood vectors.
    pub clv: FreeListStats,
    /// Transition-probability matrices.
    pub pmatrix: FreeListStats,
    /// Scale buffers.
    pub scale: FreeListStats,
}

impl PoolStats {
    /// Buffers of every kind currently handed out.
    pub fn outstanding(&self) -> usize {
        self.clv.outstanding() + self.pmatrix.outstanding() + self.scale.outstanding()
    }

    /// Counters for a single kind.
    pub fn for_kind(&self, kind: BufferKind) -> FreeListStats {
        match kind {
            BufferKind::Clv => self.clv,
            BufferKind::PMatrix => self.pmatrix,
            BufferKind::Scale => self.scale,
        }
    }
}

/// Free-list of equally sized buffers of one kind.
pub struct FreeList<T> {
    kind: BufferKind,
    len: usize,
    free: Mutex<Vec<Box<[T]>>>,
    allocated: AtomicUsize,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl<T: Copy + Default> FreeList<T> {
    fn new(kind: BufferKind, len: usize) -> Self {
        Self {
            kind,
            len,
            free: Mutex::new(Vec::new()),
            allocated: AtomicUsize::new(0),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    /// Pops a recycled buffer, or allocates a fresh one when the list is empty.
    pub fn acquire(self: &Arc<Self>) -> PooledBuffer<T> {
        let recycled = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        let data = match recycled {
            Some(data) => data,
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                vec![T::default(); self.len].into_boxed_slice()
            }
        };
        self.acquired.fetch_add(1, Ordering::Relaxed);
        PooledBuffer {
            data,
            home: Arc::clone(self),
        }
    }

    fn release(&self, data: Box<[T]>) {
        debug_assert_eq!(data.len(), self.len, "foreign buffer released");
        self.released.fetch_add(1, Ordering::Relaxed);
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(data);
    }

    /// Kind served by this list.
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Captures the current counters.
    pub fn stats(&self) -> FreeListStats {
        FreeListStats {
            allocated: self.allocated.load(Ordering::Relaxed),
            acquired: self.acquired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            idle: self
                .free
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
        }
    }
}

impl<T> fmt::Debug for FreeList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreeList")
            .field("kind", &self.kind)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// Buffer on loan from a [`FreeList`]; returned to it on drop.
pub struct PooledBuffer<T: Copy + Default> {
    data: Box<[T]>,
    home: Arc<FreeList<T>>,
}

impl<T: Copy + Default> PooledBuffer<T> {
    /// Kind of the free-list this buffer belongs to.
    pub fn kind(&self) -> BufferKind {
        self.home.kind
    }

    /// Address of the underlying storage, used to detect aliasing in tests.
    pub fn addr(&self) -> usize {
        self.data.as_ptr() as usize
    }
}

impl<T: Copy + Default> Deref for PooledBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T: Copy + Default> DerefMut for PooledBuffer<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T: Copy + Default> Drop for PooledBuffer<T> {
    fn drop(&mut self) {
        let data = std::mem::take(&mut self.data);
        self.home.release(data);
    }
}

impl<T: Copy + Default> fmt::Debug for PooledBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("kind", &self.home.kind)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Per-run pool holding one free-list per buffer kind.
#[derive(Debug)]
pub struct BufferPool {
    dims: BufferDims,
    clv: Arc<FreeList<f64>>,
    pmatrix: Arc<FreeList<f64>>,
    scale: Arc<FreeList<u32>>,
}

impl BufferPool {
    /// Creates an empty pool sized for the given run dimensions.
    pub fn new(dims: BufferDims) -> Arc<Self> {
        Arc::new(Self {
            dims,
            clv: Arc::new(FreeList::new(BufferKind::Clv, dims.clv_len)),
            pmatrix: Arc::new(FreeList::new(BufferKind::PMatrix, dims.pmatrix_len)),
            scale: Arc::new(FreeList::new(BufferKind::Scale, dims.scale_len)),
        })
    }

    /// Buffer lengths served by this pool.
    pub fn dims(&self) -> BufferDims {
        self.dims
    }

    /// Acquires a conditional-likelihood vector.
    pub fn acquire_clv(&self) -> PooledBuffer<f64> {
        self.clv.acquire()
    }

    /// Acquires a transition-probability matrix.
    pub fn acquire_pmatrix(&self) -> PooledBuffer<f64> {
        self.pmatrix.acquire()
    }

    /// Acquires a scale buffer.
    pub fn acquire_scale(&self) -> PooledBuffer<u32> {
        self.scale.acquire()
    }

    /// Captures counters for every free-list.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            clv: self.clv.stats(),
            pmatrix: self.pmatrix.stats(),
            scale: self.scale.stats(),
        }
    }
}
