//! k-nearest-neighbor graph in kernel-induced distance.
//!
//! For each item `i` the `k` items with smallest
//! `d(i, j)^2 = K(i,i) + K(j,j) - 2 K(i,j)` are kept, `j != i`. Ordering is by
//! `(distance asc, index asc)` so the result is deterministic under ties.
//!
//! Selection uses a bounded max-heap of size `k` per item instead of a full
//! sort: `O(N log k)` per item on top of the `O(N)` kernel lookups.
//!
//! Rows are computed in parallel with rayon; the only shared state is the
//! kernel cache.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::{debug, info, trace};
use rayon::prelude::*;

use crate::error::{InvalidInput, Result};
use crate::kernel::KernelCache;
use crate::similarity::Similarity;

/// Neighbor candidate ordered by `(distance, index)`.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    distance: f64,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.index.cmp(&other.index))
    }
}

/// Per-item neighbor lists, each exactly `k` long and sorted by increasing
/// kernel-induced distance.
#[derive(Clone, Debug, PartialEq)]
pub struct NeighborGraph {
    k: usize,
    neighbors: Vec<Vec<usize>>,
    distances: Vec<Vec<f64>>,
}

impl NeighborGraph {
    /// Build the neighbor graph over all items known to `kernel`.
    ///
    /// Fails with `InvalidInput` if `k == 0` or `k >= N`, before any kernel
    /// evaluation.
    pub fn build<S: Similarity + ?Sized>(kernel: &KernelCache<'_, S>, k: usize) -> Result<Self> {
        let n = kernel.n_items();
        if k == 0 {
            return Err(InvalidInput::ZeroNeighbors.into());
        }
        if k >= n {
            return Err(InvalidInput::NeighborsOutOfRange { k, n_items: n }.into());
        }

        info!("Computing {}-NN graph in kernel distance for {} items", k, n);
        let diagonal = kernel.prefetch_diagonal()?;

        let rows: Vec<(Vec<usize>, Vec<f64>)> = (0..n)
            .into_par_iter()
            .map(|i| {
                kernel.check_cancelled()?;
                Self::select_nearest(kernel, &diagonal, i, k)
            })
            .collect::<Result<_>>()?;

        let (neighbors, distances): (Vec<Vec<usize>>, Vec<Vec<f64>>) = rows.into_iter().unzip();

        debug!(
            "Neighbor graph built: {} rows, {} kernel evaluations",
            neighbors.len(),
            kernel.evaluations()
        );

        Ok(Self {
            k,
            neighbors,
            distances,
        })
    }

    fn select_nearest<S: Similarity + ?Sized>(
        kernel: &KernelCache<'_, S>,
        diagonal: &[f64],
        i: usize,
        k: usize,
    ) -> Result<(Vec<usize>, Vec<f64>)> {
        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);

        for j in (0..diagonal.len()).filter(|&j| j != i) {
            // `+ 0.0` folds -0.0 into 0.0 so total_cmp does not split ties
            let distance = diagonal[i] + diagonal[j] - 2.0 * kernel.get(i, j)? + 0.0;
            let candidate = Candidate { distance, index: j };

            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(worst) = heap.peek() {
                if candidate < *worst {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }

        let sorted = heap.into_sorted_vec();
        if i % 100 == 0 {
            trace!(
                "Item {}: nearest {:?}",
                i,
                sorted.iter().map(|c| c.index).collect::<Vec<_>>()
            );
        }

        Ok(sorted.into_iter().map(|c| (c.index, c.distance)).unzip())
    }

    /// Neighbors of `i`, nearest first.
    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.neighbors[i]
    }

    /// Squared kernel distances matching `neighbors(i)`.
    pub fn distances(&self, i: usize) -> &[f64] {
        &self.distances[i]
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn n_items(&self) -> usize {
        self.neighbors.len()
    }

    /// Directed edges `(i, j)` for every neighbor `j` of `i`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.neighbors
            .iter()
            .enumerate()
            .flat_map(|(i, row)| row.iter().map(move |&j| (i, j)))
    }

    /// Number of connected components of the undirected neighbor graph.
    pub fn connected_components(&self) -> usize {
        let n = self.n_items();
        let mut parent: Vec<usize> = (0..n).collect();

        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        let mut components = n;
        for (i, j) in self.edges() {
            let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
            if ri != rj {
                parent[ri.max(rj)] = ri.min(rj);
                components -= 1;
            }
        }
        components
    }
}
