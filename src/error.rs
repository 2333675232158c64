//! Error and warning taxonomy for an embedding run.
//!
//! - `InvalidInput`: structural preconditions, reported before any similarity
//!   evaluation, or a similarity provider failure (the run aborts).
//! - `NumericalError`: a local reconstruction that stays degenerate after
//!   regularisation, or an eigensolver failure.
//! - `EmbeddingWarning`: non-fatal conditions attached to a finished embedding.

use thiserror::Error;

use crate::similarity::SimilarityError;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInput),

    #[error("numerical failure: {0}")]
    Numerical(#[from] NumericalError),

    #[error("embedding run cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum InvalidInput {
    #[error("{n_items} items cannot be embedded (at least 2 are required)")]
    TooFewItems { n_items: usize },

    #[error("k = {k} must be smaller than the number of items ({n_items})")]
    NeighborsOutOfRange { k: usize, n_items: usize },

    #[error("k must be at least 1")]
    ZeroNeighbors,

    #[error("target dimension d = {d} must be smaller than the number of items ({n_items})")]
    DimensionOutOfRange { d: usize, n_items: usize },

    #[error("target dimension must be at least 1")]
    ZeroDimension,

    #[error("parameter `{name}` is invalid: {reason}")]
    BadParameter { name: &'static str, reason: String },

    #[error("similarity({i}, {j}) failed: {source}")]
    SimilarityFailed {
        i: usize,
        j: usize,
        #[source]
        source: SimilarityError,
    },

    #[error("similarity({i}, {j}) returned a non-finite value {value}")]
    NonFiniteSimilarity { i: usize, j: usize, value: f64 },
}

#[derive(Debug, Error)]
pub enum NumericalError {
    #[error("local reconstruction for item {item} is degenerate (Gram trace {trace:e}, last shift {shift:e})")]
    DegenerateNeighborhood { item: usize, trace: f64, shift: f64 },

    #[error("eigensolver failed: {0}")]
    EigenSolver(String),

    #[error("eigensolver returned a non-finite or zero-norm eigenvector at position {0}")]
    NonFiniteEigenvector(usize),
}

/// Non-fatal conditions detected while producing an embedding.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingWarning {
    /// The neighborhood graph is not a single component; relative placement
    /// between components is arbitrary.
    DisconnectedGraph {
        components: usize,
        near_zero_eigenvalues: usize,
    },
}

impl std::fmt::Display for EmbeddingWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingWarning::DisconnectedGraph {
                components,
                near_zero_eigenvalues,
            } => write!(
                f,
                "disconnected neighborhood graph: {} components, {} near-zero eigenvalues",
                components, near_zero_eigenvalues
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;
