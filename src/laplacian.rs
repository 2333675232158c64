//! # Sparse weight matrix and alignment matrix
//!
//! 1. **Scatter**: row `i` of `W` holds item `i`'s reconstruction weights in the
//!    columns of its neighbors, zero elsewhere (`k` non-zeros per row).
//! 2. **Alignment**: `M = (I - W)^T (I - W)`, accumulated row by row as
//!    `M = sum_r a_r^T a_r` where `a_r` is row `r` of `I - W`. Each row
//!    contributes `(k + 1)^2` triplets; duplicates are summed by `TriMat::to_csr`.
//!
//! `M` is symmetric positive-semidefinite, and since every weight row sums to
//! one, `(I - W) 1 = 0`: the constant vector is always in its null space.
//!
//! ## Complexity
//! - `W`: `O(N k)` triplets
//! - `M`: `O(N k^2)` triplets before compression, parallel over rows

use log::{debug, info, trace};
use rayon::prelude::*;
use sprs::{CsMat, TriMat};

use crate::graph::NeighborGraph;
use crate::reconstruction::ReconstructionWeights;

/// Sparse `N x N` reconstruction weight matrix `W` (CSR).
#[derive(Clone, Debug)]
pub struct WeightMatrix {
    pub matrix: CsMat<f64>,
}

impl WeightMatrix {
    /// Scatter each weight row into the columns given by the neighbor list.
    ///
    /// # Panics
    ///
    /// Panics if `graph` and `weights` disagree on item count or row lengths.
    pub fn from_rows(graph: &NeighborGraph, weights: &ReconstructionWeights) -> Self {
        let n = graph.n_items();
        assert_eq!(
            n,
            weights.n_items(),
            "neighbor graph and weights must cover the same items"
        );
        info!("Assembling sparse weight matrix W ({}x{})", n, n);

        let mut triplets: TriMat<f64> = TriMat::with_capacity((n, n), n * graph.k());
        for i in 0..n {
            let row = weights.row(i);
            assert_eq!(
                row.len(),
                graph.neighbors(i).len(),
                "weight row {} does not match its neighbor list",
                i
            );
            for (&j, &w) in graph.neighbors(i).iter().zip(row.iter()) {
                triplets.add_triplet(i, j, w);
            }
        }

        let matrix: CsMat<f64> = triplets.to_csr();
        debug!("W has {} non-zeros", matrix.nnz());
        Self { matrix }
    }

    pub fn n_items(&self) -> usize {
        self.matrix.rows()
    }

    /// Sum of row `i`; one for every well-formed weight row.
    pub fn row_sum(&self, i: usize) -> f64 {
        self.matrix
            .outer_view(i)
            .map(|row| row.iter().map(|(_, &w)| w).sum())
            .unwrap_or(0.0)
    }
}

/// Symmetric PSD alignment matrix `M = (I - W)^T (I - W)` (CSR).
#[derive(Clone, Debug)]
pub struct AlignmentMatrix {
    pub matrix: CsMat<f64>,
}

impl AlignmentMatrix {
    pub fn from_weights(weights: &WeightMatrix) -> Self {
        let n = weights.n_items();
        info!("Forming alignment matrix M = (I - W)^T (I - W) for {} items", n);

        // rows of I - W as sparse (column, value) lists, collected in parallel
        let contributions: Vec<Vec<(usize, usize, f64)>> = (0..n)
            .into_par_iter()
            .map(|r| {
                let mut row: Vec<(usize, f64)> = vec![(r, 1.0)];
                if let Some(view) = weights.matrix.outer_view(r) {
                    for (j, &w) in view.iter() {
                        if j == r {
                            row[0].1 -= w;
                        } else {
                            row.push((j, -w));
                        }
                    }
                }
                let mut out = Vec::with_capacity(row.len() * row.len());
                for &(p, a_p) in &row {
                    for &(q, a_q) in &row {
                        out.push((p, q, a_p * a_q));
                    }
                }
                out
            })
            .collect();

        trace!("Accumulating alignment triplets");
        let total: usize = contributions.iter().map(|c| c.len()).sum();
        let mut triplets: TriMat<f64> = TriMat::with_capacity((n, n), total);
        for (p, q, v) in contributions.into_iter().flatten() {
            triplets.add_triplet(p, q, v);
        }

        let matrix: CsMat<f64> = triplets.to_csr();
        debug!(
            "M has {} non-zeros ({:.2}% sparse)",
            matrix.nnz(),
            Self::sparsity(&matrix) * 100.0
        );
        Self { matrix }
    }

    pub fn n_items(&self) -> usize {
        self.matrix.rows()
    }

    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    /// Entry `M[i][j]`, zero when not stored.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.matrix.get(i, j).copied().unwrap_or(0.0)
    }

    /// Fraction of zero entries.
    pub fn sparsity(matrix: &CsMat<f64>) -> f64 {
        let total = (matrix.rows() * matrix.cols()) as f64;
        if total == 0.0 {
            return 0.0;
        }
        1.0 - matrix.nnz() as f64 / total
    }

    /// Dense row-major copy of `M`.
    pub fn to_dense_rows(&self) -> Vec<Vec<f64>> {
        let n = self.n_items();
        let mut dense = vec![vec![0.0; n]; n];
        for (&v, (i, j)) in self.matrix.iter() {
            dense[i][j] += v;
        }
        dense
    }
}
