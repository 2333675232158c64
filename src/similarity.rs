//! Pairwise similarity capability consumed by the embedding core.
//!
//! The core never inspects items: it only asks an implementation of
//! [`Similarity`] for the kernel value between two item indices. Implementations
//! must be symmetric; the core evaluates each unordered pair at most once and
//! mirrors the result.
//!
//! Any `Fn(usize, usize) -> f64 + Sync` closure is a valid provider:
//!
//! ```
//! use kernel_lle::similarity::Similarity;
//!
//! let values = [1.0_f64, 2.0, 4.0];
//! let sim = |i: usize, j: usize| values[i] * values[j];
//! assert_eq!(sim.similarity(1, 2).unwrap(), 8.0);
//! ```

use thiserror::Error;

/// Failure reported by a similarity provider for one pair.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SimilarityError {
    message: String,
}

impl SimilarityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Kernel value between two items, used in place of a dot product in an
/// implicit feature space.
pub trait Similarity: Sync {
    /// Similarity between items `i` and `j`. `similarity(i, i)` is queried too
    /// and does not need to be constant across items.
    fn similarity(&self, i: usize, j: usize) -> Result<f64, SimilarityError>;
}

impl<F> Similarity for F
where
    F: Fn(usize, usize) -> f64 + Sync,
{
    #[inline]
    fn similarity(&self, i: usize, j: usize) -> Result<f64, SimilarityError> {
        Ok(self(i, j))
    }
}
