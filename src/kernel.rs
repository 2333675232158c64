//! Memoised symmetric kernel lookup over item indices.
//!
//! `KernelCache` sits between the similarity provider and every later stage.
//! Values are stored once per unordered pair under the canonical key
//! `(min(i, j), max(i, j))`, so `K(i, j) == K(j, i)` holds by construction.
//!
//! The store is a `DashMap` of per-pair cells. The shard lock is held only to
//! fetch or create a cell; the provider runs under the cell's own lock, so
//! concurrent requests for the same pair result in a single provider call while
//! slow evaluations never block other pairs hashed to the same shard.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use log::{debug, info, trace};
use rayon::prelude::*;

use crate::error::{EmbeddingError, InvalidInput, Result};
use crate::similarity::Similarity;

pub struct KernelCache<'s, S: Similarity + ?Sized> {
    similarity: &'s S,
    n_items: usize,
    values: DashMap<(usize, usize), Arc<Mutex<Option<f64>>>>,
    evaluations: AtomicUsize,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'s, S: Similarity + ?Sized> KernelCache<'s, S> {
    pub fn new(similarity: &'s S, n_items: usize) -> Self {
        debug!("Creating kernel cache for {} items", n_items);
        Self {
            similarity,
            n_items,
            values: DashMap::new(),
            evaluations: AtomicUsize::new(0),
            cancel: None,
        }
    }

    /// Attach a cooperative cancellation flag, checked between items by the
    /// per-item stages.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Number of similarity provider calls made so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }

    /// Number of distinct unordered pairs stored or being evaluated.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(EmbeddingError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Kernel value `K(i, j)`, evaluating the provider on first access.
    ///
    /// # Panics
    ///
    /// Panics if `i` or `j` is not a valid item index.
    pub fn get(&self, i: usize, j: usize) -> Result<f64> {
        assert!(
            i < self.n_items && j < self.n_items,
            "Index out of bounds: ({}, {}) for {} items",
            i,
            j,
            self.n_items
        );
        let key = if i <= j { (i, j) } else { (j, i) };

        let cached = self.values.get(&key).map(|c| Arc::clone(c.value()));
        let cell = match cached {
            Some(cell) => cell,
            None => Arc::clone(self.values.entry(key).or_default().value()),
        };
        let mut slot = cell.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(v) = *slot {
            return Ok(v);
        }

        match self.evaluate(key.0, key.1) {
            Ok(v) => {
                *slot = Some(v);
                Ok(v)
            }
            Err(e) => {
                drop(slot);
                self.values.remove(&key);
                Err(e)
            }
        }
    }

    /// Kernel-induced squared distance `K(i,i) + K(j,j) - 2 K(i,j)`.
    ///
    /// Not clamped: indefinite kernels may yield negative values, which still
    /// order neighbors consistently.
    pub fn distance_sq(&self, i: usize, j: usize) -> Result<f64> {
        Ok(self.get(i, i)? + self.get(j, j)? - 2.0 * self.get(i, j)?)
    }

    /// Evaluate the diagonal `K(i, i)` for every item in parallel.
    pub fn prefetch_diagonal(&self) -> Result<Vec<f64>> {
        info!("Evaluating kernel diagonal for {} items", self.n_items);
        let diagonal = (0..self.n_items)
            .into_par_iter()
            .map(|i| self.get(i, i))
            .collect::<Result<Vec<f64>>>()?;
        debug!(
            "Kernel diagonal ready: {} evaluations so far",
            self.evaluations()
        );
        Ok(diagonal)
    }

    fn evaluate(&self, i: usize, j: usize) -> Result<f64> {
        let value = self
            .similarity
            .similarity(i, j)
            .map_err(|source| InvalidInput::SimilarityFailed { i, j, source })?;
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        if !value.is_finite() {
            return Err(InvalidInput::NonFiniteSimilarity { i, j, value }.into());
        }
        trace!("K({}, {}) = {:.6}", i, j, value);
        Ok(value)
    }
}
