//! Local reconstruction weights from kernel values only.
//!
//! For item `i` with neighbors `j_1..j_k`, minimising
//! `|| phi(i) - sum_a w_a phi(j_a) ||^2` subject to `sum_a w_a = 1` reduces to
//! solving `G w = 1` and rescaling, where the local Gram matrix of the centred
//! neighbors is
//!
//! ```text
//! G[a][b] = K(i,i) - K(i,j_a) - K(i,j_b) + K(j_a,j_b)
//! ```
//!
//! `G` is rank deficient whenever `k` exceeds the (implicit) feature-space
//! dimension, so its diagonal always receives `shift * |trace(G)|`. If the
//! solve still fails (singular factorisation, non-finite solution, vanishing
//! weight sum) the shift is escalated tenfold, up to `max_escalations` times.
//! A neighborhood whose Gram trace is zero cannot be regularised and aborts the
//! run with `NumericalError::DegenerateNeighborhood`.
//!
//! Weights are affine, not convex: they sum to one but may be negative.

use log::{debug, info, trace, warn};
use rayon::prelude::*;

use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linalg::traits::lu::LUDecomposable;

use crate::error::{NumericalError, Result};
use crate::graph::NeighborGraph;
use crate::kernel::KernelCache;
use crate::similarity::Similarity;

/// Below this magnitude the Gram trace or the raw weight sum is treated as zero.
const DEGENERACY_FLOOR: f64 = 1e-12;

/// Weights of one item over its neighbors, in neighbor order.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalWeights {
    pub weights: Vec<f64>,
    /// Effective diagonal shift factor used for the successful solve.
    pub shift: f64,
    /// Number of tenfold escalations beyond the base shift.
    pub escalations: usize,
}

/// Reconstruction weights for all items, aligned with a `NeighborGraph`.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconstructionWeights {
    rows: Vec<LocalWeights>,
}

impl ReconstructionWeights {
    /// Solve every item's local problem in parallel.
    pub fn compute<S: Similarity + ?Sized>(
        kernel: &KernelCache<'_, S>,
        graph: &NeighborGraph,
        shift: f64,
        max_escalations: usize,
    ) -> Result<Self> {
        let n = graph.n_items();
        info!(
            "Solving local reconstruction weights: {} items, k={}, shift={:e}",
            n,
            graph.k(),
            shift
        );

        let rows = (0..n)
            .into_par_iter()
            .map(|i| {
                kernel.check_cancelled()?;
                solve_local_weights(kernel, i, graph.neighbors(i), shift, max_escalations)
            })
            .collect::<Result<Vec<LocalWeights>>>()?;

        let escalated = rows.iter().filter(|r| r.escalations > 0).count();
        if escalated > 0 {
            warn!(
                "{} of {} neighborhoods needed shift escalation beyond {:e}",
                escalated, n, shift
            );
        }
        debug!("Reconstruction weights ready for {} items", rows.len());

        Ok(Self { rows })
    }

    /// Weights of item `i`, aligned with `NeighborGraph::neighbors(i)`.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.rows[i].weights
    }

    pub fn local(&self, i: usize) -> &LocalWeights {
        &self.rows[i]
    }

    pub fn n_items(&self) -> usize {
        self.rows.len()
    }

    /// Items whose solve needed more than the base shift.
    pub fn regularised_items(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.escalations > 0)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.rows.iter().map(|r| r.weights.as_slice())
    }
}

/// Build the regularisation-free local Gram matrix for item `i`.
pub fn local_gram<S: Similarity + ?Sized>(
    kernel: &KernelCache<'_, S>,
    i: usize,
    neighbors: &[usize],
) -> Result<Vec<Vec<f64>>> {
    let k = neighbors.len();
    let k_ii = kernel.get(i, i)?;
    let dots = neighbors
        .iter()
        .map(|&j| kernel.get(i, j))
        .collect::<Result<Vec<f64>>>()?;

    let mut gram = vec![vec![0.0; k]; k];
    for a in 0..k {
        for b in a..k {
            let value = k_ii - dots[a] - dots[b] + kernel.get(neighbors[a], neighbors[b])?;
            gram[a][b] = value;
            gram[b][a] = value;
        }
    }
    Ok(gram)
}

/// Solve the constrained least-squares problem for item `i`.
pub fn solve_local_weights<S: Similarity + ?Sized>(
    kernel: &KernelCache<'_, S>,
    i: usize,
    neighbors: &[usize],
    shift: f64,
    max_escalations: usize,
) -> Result<LocalWeights> {
    let gram = local_gram(kernel, i, neighbors)?;
    let trace: f64 = (0..gram.len()).map(|a| gram[a][a]).sum();

    if !trace.is_finite() || trace.abs() <= DEGENERACY_FLOOR {
        return Err(NumericalError::DegenerateNeighborhood {
            item: i,
            trace,
            shift,
        }
        .into());
    }

    let mut current = shift;
    for escalations in 0..=max_escalations {
        if let Some(weights) = solve_shifted(&gram, current * trace.abs()) {
            if escalations > 0 {
                debug!(
                    "Item {}: solved after {} escalations (shift {:e})",
                    i, escalations, current
                );
            }
            trace!("Item {}: weights {:?}", i, weights);
            return Ok(LocalWeights {
                weights,
                shift: current,
                escalations,
            });
        }
        warn!(
            "Item {}: local Gram solve failed with shift {:e}, escalating",
            i, current
        );
        current *= 10.0;
    }

    Err(NumericalError::DegenerateNeighborhood {
        item: i,
        trace,
        shift: current / 10.0,
    }
    .into())
}

/// `G + ridge I` solved against the ones vector and rescaled to sum to one.
/// Returns `None` when the system is singular or the result unusable.
fn solve_shifted(gram: &[Vec<f64>], ridge: f64) -> Option<Vec<f64>> {
    let k = gram.len();
    let mut shifted = gram.to_vec();
    for (a, row) in shifted.iter_mut().enumerate() {
        row[a] += ridge;
    }

    let g = DenseMatrix::from_2d_vec(&shifted).ok()?;
    let rhs = DenseMatrix::from_2d_vec(&vec![vec![1.0]; k]).ok()?;
    // the LU solve panics on a zero pivot, so reject singular factors first
    let u = g.lu().ok()?.U();
    if (0..k).any(|a| {
        let pivot = *u.get((a, a));
        pivot == 0.0 || pivot.is_nan()
    }) {
        return None;
    }
    let solution = g.lu_solve_mut(rhs).ok()?;

    let raw: Vec<f64> = (0..k).map(|a| *solution.get((a, 0))).collect();
    let sum: f64 = raw.iter().sum();
    if !sum.is_finite() || sum.abs() <= DEGENERACY_FLOOR || raw.iter().any(|w| !w.is_finite()) {
        return None;
    }

    // rescale to absorb drift from the solve
    let weights: Vec<f64> = raw.iter().map(|w| w / sum).collect();
    let residual: f64 = weights.iter().sum::<f64>() - 1.0;
    if residual.abs() > 1e-9 {
        return None;
    }
    Some(weights)
}
