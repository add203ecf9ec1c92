#![deny(missing_docs)]
#![doc = "Core traits and data types shared by the combinatorial SMC phylogenetic sampler."]

pub mod errors;
pub mod oracle;
pub mod rng;

pub use errors::{CsmcError, ErrorInfo};
pub use oracle::{BufferDims, ChildPartial, LikelihoodOracle};
pub use rng::{derive_substream_seed, RngHandle};

/// Number of nucleotide states handled by the built-in models.
pub const NUCLEOTIDE_STATES: usize = 4;
