//! # kernel-lle
//!
//! Kernel locally linear embedding: low-dimensional coordinates for a
//! collection of items (e.g. symbolic sequences) known only through a pairwise
//! similarity, preserving local neighborhood geometry measured in kernel space.
//!
//! The pipeline runs strictly forward:
//!
//! 1. [`kernel::KernelCache`] memoises the similarity provider per unordered pair.
//! 2. [`graph::NeighborGraph`] selects `k` nearest items in kernel-induced distance.
//! 3. [`reconstruction::ReconstructionWeights`] solves each item's affine
//!    reconstruction from its neighbors.
//! 4. [`laplacian::AlignmentMatrix`] assembles `M = (I - W)^T (I - W)`.
//! 5. [`eigenmaps::SpectralSolver`] returns the bottom of `M`'s spectrum; the
//!    constant mode is skipped and the next `d` eigenvectors form the output.
//!
//! ```
//! use kernel_lle::builder::KernelLleBuilder;
//! use kernel_lle::sequence::{MatchKernel, SequenceSet};
//!
//! let seqs = SequenceSet::new(
//!     ["AAAA", "AAAC", "CCCC", "CCCA"].iter().map(|s| s.to_string()).collect(),
//! );
//! let embedding = KernelLleBuilder::new()
//!     .with_neighbors(2)
//!     .with_target_dimension(1)
//!     .build()
//!     .unwrap()
//!     .embed(seqs.len(), &MatchKernel::new(&seqs))
//!     .unwrap();
//!
//! let gap_within = (embedding.get(0, 0) - embedding.get(1, 0)).abs();
//! let gap_across = (embedding.get(0, 0) - embedding.get(2, 0)).abs();
//! assert!(gap_within < gap_across);
//! ```
//!
//! The library only logs through the `log` facade; install a logger such as
//! `env_logger` in the binary to see stage progress.

pub mod builder;
pub mod eigenmaps;
pub mod error;
pub mod graph;
pub mod kernel;
pub mod laplacian;
pub mod reconstruction;
pub mod sequence;
pub mod similarity;

pub use builder::{EmbeddingParams, KernelLle, KernelLleBuilder};
pub use eigenmaps::{DenseEigenSolver, Embedding, SpectralSolver};
pub use error::{EmbeddingError, EmbeddingWarning, InvalidInput, NumericalError};
pub use similarity::{Similarity, SimilarityError};

#[cfg(test)]
mod tests;
