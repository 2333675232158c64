//! # Eigen maps for kernel LLE
//!
//! This module exposes the stages of `KernelLle::embed` as a trait-based API,
//! so callers can run them one at a time, inspect intermediate artifacts, or
//! swap the eigensolver.
//!
//! # Pipeline Stages
//!
//! 1. **Neighbors**: k-NN graph in kernel-induced distance (`graph.rs`).
//! 2. **Weights**: per-item constrained least-squares reconstruction
//!    (`reconstruction.rs`).
//! 3. **Alignment**: sparse `W` and `M = (I - W)^T (I - W)` (`laplacian.rs`).
//! 4. **Spectral**: the `d + 1` smallest eigenpairs of `M` from a
//!    [`SpectralSolver`]; the bottom (constant) mode is discarded and near-zero
//!    eigenvalues beyond it are reported as a disconnected graph.
//! 5. **Assembly**: the `d` kept eigenvectors become the columns of the
//!    `N x d` coordinate matrix. Sign and rotation of eigenvectors are passed
//!    through unchanged.
//!
//! # Usage Example
//!
//! ```
//! use kernel_lle::builder::KernelLleBuilder;
//! use kernel_lle::eigenmaps::EmbeddingStages;
//! use kernel_lle::kernel::KernelCache;
//!
//! let points = [0.0_f64, 0.2, 0.4, 0.6, 0.8, 1.0];
//! let sim = |i: usize, j: usize| (-(points[i] - points[j]).powi(2)).exp();
//!
//! let lle = KernelLleBuilder::new()
//!     .with_neighbors(2)
//!     .with_target_dimension(1)
//!     .build()
//!     .unwrap();
//!
//! let kernel = KernelCache::new(&sim, points.len());
//! let graph = lle.neighbor_stage(&kernel).unwrap();
//! let weights = lle.weight_stage(&kernel, &graph).unwrap();
//! let m = lle.alignment_stage(&graph, &weights);
//! let embedding = lle.spectral_stage(&m, graph, weights, kernel.evaluations()).unwrap();
//! assert_eq!(embedding.shape(), (6, 1));
//! ```

use log::{debug, info, trace, warn};

use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linalg::traits::evd::EVDDecomposable;

use crate::builder::KernelLle;
use crate::error::{EmbeddingWarning, NumericalError, Result};
use crate::graph::NeighborGraph;
use crate::kernel::KernelCache;
use crate::laplacian::{AlignmentMatrix, WeightMatrix};
use crate::reconstruction::ReconstructionWeights;
use crate::similarity::Similarity;

/// Eigenpairs ordered by ascending eigenvalue. `vectors[c]` is the eigenvector
/// for `values[c]`, of length `N`.
#[derive(Clone, Debug)]
pub struct EigenPairs {
    pub values: Vec<f64>,
    pub vectors: Vec<Vec<f64>>,
}

impl EigenPairs {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Numerical collaborator computing the bottom of the spectrum of `M`.
pub trait SpectralSolver: Send + Sync {
    /// The `count` eigenpairs of the symmetric matrix `m` with smallest
    /// eigenvalues, ascending, each eigenvector of unit norm.
    fn smallest_eigenpairs(&self, m: &AlignmentMatrix, count: usize) -> Result<EigenPairs>;
}

/// Densifies `M` and runs a full symmetric eigendecomposition.
///
/// `O(N^3)` time and `O(N^2)` memory; adequate for collections up to a few
/// thousand items.
#[derive(Clone, Copy, Debug, Default)]
pub struct DenseEigenSolver;

impl SpectralSolver for DenseEigenSolver {
    fn smallest_eigenpairs(&self, m: &AlignmentMatrix, count: usize) -> Result<EigenPairs> {
        let n = m.n_items();
        if count > n {
            return Err(NumericalError::EigenSolver(format!(
                "requested {} eigenpairs from a {}x{} matrix",
                count, n, n
            ))
            .into());
        }
        debug!("Dense symmetric eigendecomposition of {}x{} matrix", n, n);

        let dense = DenseMatrix::from_2d_vec(&m.to_dense_rows())
            .map_err(|e| NumericalError::EigenSolver(e.to_string()))?;
        let evd = dense
            .evd(true)
            .map_err(|e| NumericalError::EigenSolver(e.to_string()))?;

        let mut order: Vec<usize> = (0..evd.d.len()).collect();
        order.sort_by(|&a, &b| evd.d[a].total_cmp(&evd.d[b]).then_with(|| a.cmp(&b)));
        order.truncate(count);

        let values: Vec<f64> = order.iter().map(|&c| evd.d[c]).collect();
        let vectors: Vec<Vec<f64>> = order
            .iter()
            .map(|&c| (0..n).map(|r| *evd.V.get((r, c))).collect())
            .collect();

        trace!("Smallest eigenvalues: {:?}", values);
        Ok(EigenPairs { values, vectors })
    }
}

/// Final artifact of one embedding run.
#[derive(Clone, Debug)]
pub struct Embedding {
    /// `N x d` coordinates, row `i` for item `i`.
    pub coordinates: DenseMatrix<f64>,
    /// Eigenvalues of the `d` retained modes, ascending.
    pub eigenvalues: Vec<f64>,
    pub neighbors: NeighborGraph,
    pub weights: ReconstructionWeights,
    pub warnings: Vec<EmbeddingWarning>,
    /// Similarity provider calls made during the run.
    pub kernel_evaluations: usize,
}

impl Embedding {
    pub fn shape(&self) -> (usize, usize) {
        self.coordinates.shape()
    }

    /// Coordinates of item `i`.
    pub fn row(&self, i: usize) -> Vec<f64> {
        let (_, d) = self.shape();
        (0..d).map(|c| *self.coordinates.get((i, c))).collect()
    }

    pub fn get(&self, i: usize, c: usize) -> f64 {
        *self.coordinates.get((i, c))
    }

    pub fn is_disconnected(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, EmbeddingWarning::DisconnectedGraph { .. }))
    }
}

/// Copy the non-trivial eigenvectors into an `N x d` matrix, skipping the
/// first (constant) mode.
pub fn assemble_embedding(pairs: &EigenPairs, d: usize) -> Result<DenseMatrix<f64>> {
    if pairs.len() < d + 1 {
        return Err(NumericalError::EigenSolver(format!(
            "solver returned {} eigenpairs, {} required",
            pairs.len(),
            d + 1
        ))
        .into());
    }
    let n = pairs.vectors[0].len();
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|i| (1..=d).map(|c| pairs.vectors[c][i]).collect())
        .collect();
    DenseMatrix::from_2d_vec(&rows).map_err(|e| NumericalError::EigenSolver(e.to_string()).into())
}

/// Count eigenvalues after the first that are numerically zero relative to
/// `scale`.
pub fn count_near_zero(values: &[f64], tolerance: f64, scale: f64) -> usize {
    let threshold = tolerance * scale.max(1.0);
    values.iter().skip(1).filter(|v| v.abs() <= threshold).count()
}

/// Check unit norm and finiteness of every eigenvector, renormalising drift.
fn normalise_vectors(pairs: &mut EigenPairs, n: usize) -> Result<()> {
    for (c, v) in pairs.vectors.iter_mut().enumerate() {
        let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        if v.len() != n || !norm.is_finite() || norm <= f64::EPSILON {
            return Err(NumericalError::NonFiniteEigenvector(c).into());
        }
        if (norm - 1.0).abs() > 1e-10 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
    }
    Ok(())
}

/// Decomposes `KernelLle::embed` into explicit stages. All stages preserve the
/// semantics of the one-shot path.
pub trait EmbeddingStages {
    /// Stage 1: `k`-nearest neighbors in kernel distance.
    fn neighbor_stage<S: Similarity + ?Sized>(
        &self,
        kernel: &KernelCache<'_, S>,
    ) -> Result<NeighborGraph>;

    /// Stage 2: reconstruction weights for every item.
    fn weight_stage<S: Similarity + ?Sized>(
        &self,
        kernel: &KernelCache<'_, S>,
        graph: &NeighborGraph,
    ) -> Result<ReconstructionWeights>;

    /// Stage 3: sparse `W` and alignment matrix `M`.
    fn alignment_stage(
        &self,
        graph: &NeighborGraph,
        weights: &ReconstructionWeights,
    ) -> AlignmentMatrix;

    /// Stages 4 and 5: eigensolve, connectivity diagnostics, and assembly.
    fn spectral_stage(
        &self,
        m: &AlignmentMatrix,
        graph: NeighborGraph,
        weights: ReconstructionWeights,
        kernel_evaluations: usize,
    ) -> Result<Embedding>;
}

impl EmbeddingStages for KernelLle {
    fn neighbor_stage<S: Similarity + ?Sized>(
        &self,
        kernel: &KernelCache<'_, S>,
    ) -> Result<NeighborGraph> {
        info!("EmbeddingStages::neighbor_stage: k={}", self.params().k);
        NeighborGraph::build(kernel, self.params().k)
    }

    fn weight_stage<S: Similarity + ?Sized>(
        &self,
        kernel: &KernelCache<'_, S>,
        graph: &NeighborGraph,
    ) -> Result<ReconstructionWeights> {
        info!("EmbeddingStages::weight_stage: {} items", graph.n_items());
        ReconstructionWeights::compute(
            kernel,
            graph,
            self.params().reconstruction_shift,
            self.params().max_shift_escalations,
        )
    }

    fn alignment_stage(
        &self,
        graph: &NeighborGraph,
        weights: &ReconstructionWeights,
    ) -> AlignmentMatrix {
        let w = WeightMatrix::from_rows(graph, weights);
        AlignmentMatrix::from_weights(&w)
    }

    fn spectral_stage(
        &self,
        m: &AlignmentMatrix,
        graph: NeighborGraph,
        weights: ReconstructionWeights,
        kernel_evaluations: usize,
    ) -> Result<Embedding> {
        let n = m.n_items();
        let d = self.params().d;
        info!(
            "EmbeddingStages::spectral_stage: {} eigenpairs of {}x{} matrix",
            d + 1,
            n,
            n
        );

        let mut pairs = self.solver().smallest_eigenpairs(m, d + 1)?;
        normalise_vectors(&mut pairs, n)?;

        let scale = (0..n).map(|i| m.get(i, i)).fold(0.0_f64, f64::max);
        let near_zero = count_near_zero(&pairs.values, self.params().eigenvalue_tolerance, scale);
        let components = graph.connected_components();

        let mut warnings = Vec::new();
        if near_zero > 0 || components > 1 {
            warn!(
                "Neighborhood graph is disconnected: {} components, {} extra near-zero eigenvalues",
                components, near_zero
            );
            warnings.push(EmbeddingWarning::DisconnectedGraph {
                components,
                near_zero_eigenvalues: near_zero,
            });
        }

        let coordinates = assemble_embedding(&pairs, d)?;
        let eigenvalues = pairs.values[1..=d].to_vec();
        info!(
            "Embedding complete: {}x{} coordinates, eigenvalues {:?}",
            n, d, eigenvalues
        );

        Ok(Embedding {
            coordinates,
            eigenvalues,
            neighbors: graph,
            weights,
            warnings,
            kernel_evaluations,
        })
    }
}
