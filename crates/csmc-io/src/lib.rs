#![deny(missing_docs)]

//! Sequence input and tree output formats.

/// FASTA sequence source.
pub mod fasta;
/// Newick rendering of finished trees.
pub mod newick;

pub use fasta::{parse_fasta, read_fasta, read_fasta_file};
pub use newick::{escape_label, to_newick};
