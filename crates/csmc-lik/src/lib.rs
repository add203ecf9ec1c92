#![deny(missing_docs)]

//! Built-in nucleotide likelihood kernel for the sampler.
//!
//! Sequences are validated into an [`Alignment`], paired with a
//! [`NucleotideModel`] and served to the forest through [`PruningOracle`].

mod alignment;
mod model;
mod pruning;

pub use alignment::{nucleotide_mask, Alignment, SequenceRecord};
pub use model::{ModelConfig, NucleotideModel};
pub use pruning::{PruningOracle, SCALE_FACTOR, SCALE_THRESHOLD};
