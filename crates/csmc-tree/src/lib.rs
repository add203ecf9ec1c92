#![deny(missing_docs)]

//! Persistent phylogenetic forest with pooled numeric buffers.
//!
//! Tree fragments are immutable once built and shared between forests through
//! reference counting. Each internal node and edge borrows its numeric storage
//! from a per-run [`BufferPool`] and returns it when the last reference drops.

mod forest;
mod hash;
mod node;
/// Free-list recycler backing node and edge buffers.
pub mod pool;

pub use forest::Forest;
pub use hash::topology_hash;
pub use node::{NodeRef, TreeEdge, TreeNode};
pub use pool::{BufferKind, BufferPool, FreeListStats, PoolStats, PooledBuffer};
