use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use crate::eigenmaps::{DenseEigenSolver, Embedding, EmbeddingStages, SpectralSolver};
use crate::error::{InvalidInput, Result};
use crate::kernel::KernelCache;
use crate::similarity::Similarity;

/// Parameters of one kernel LLE run.
///
/// A good starting point keeps neighborhoods small relative to the collection
/// (`k` around 10-30) and the base shift at `1e-3`, which regularises local Gram
/// matrices that are rank deficient when `k` exceeds the implicit feature
/// dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingParams {
    /// Neighbors per item.
    pub k: usize,
    /// Target embedding dimension.
    pub d: usize,
    /// Base diagonal shift, as a fraction of the local Gram trace.
    pub reconstruction_shift: f64,
    /// Tenfold shift escalations allowed before a neighborhood is degenerate.
    pub max_shift_escalations: usize,
    /// Relative threshold below which an eigenvalue of `M` counts as zero.
    pub eigenvalue_tolerance: f64,
    /// Worker threads; `None` uses the rayon global pool.
    pub threads: Option<usize>,
}

impl Default for EmbeddingParams {
    fn default() -> Self {
        Self {
            k: 10,
            d: 2,
            reconstruction_shift: 1e-3,
            max_shift_escalations: 6,
            eigenvalue_tolerance: 1e-9,
            threads: None,
        }
    }
}

// Custom PartialEq using approximate equality for floats
impl PartialEq for EmbeddingParams {
    fn eq(&self, other: &Self) -> bool {
        self.k == other.k
            && self.d == other.d
            && approx::relative_eq!(self.reconstruction_shift, other.reconstruction_shift)
            && self.max_shift_escalations == other.max_shift_escalations
            && approx::relative_eq!(self.eigenvalue_tolerance, other.eigenvalue_tolerance)
            && self.threads == other.threads
    }
}

impl EmbeddingParams {
    /// Checks that do not depend on the item count.
    pub fn validate(&self) -> std::result::Result<(), InvalidInput> {
        if self.k == 0 {
            return Err(InvalidInput::ZeroNeighbors);
        }
        if self.d == 0 {
            return Err(InvalidInput::ZeroDimension);
        }
        if !(self.reconstruction_shift.is_finite() && self.reconstruction_shift > 0.0) {
            return Err(InvalidInput::BadParameter {
                name: "reconstruction_shift",
                reason: format!("must be finite and > 0, got {}", self.reconstruction_shift),
            });
        }
        if !(self.eigenvalue_tolerance.is_finite() && self.eigenvalue_tolerance >= 0.0) {
            return Err(InvalidInput::BadParameter {
                name: "eigenvalue_tolerance",
                reason: format!("must be finite and >= 0, got {}", self.eigenvalue_tolerance),
            });
        }
        if self.threads == Some(0) {
            return Err(InvalidInput::BadParameter {
                name: "threads",
                reason: "must be at least 1 when set".to_string(),
            });
        }
        Ok(())
    }

    /// Shrink `k` and `d` so they fit a collection of `n_items` (at least 2).
    pub fn fit_to(mut self, n_items: usize) -> Self {
        let limit = n_items.saturating_sub(1).max(1);
        if self.k > limit || self.d > limit {
            debug!(
                "Clamping k={} d={} to {} for {} items",
                self.k, self.d, limit, n_items
            );
        }
        self.k = self.k.min(limit);
        self.d = self.d.min(limit);
        self
    }

    /// Checks against a concrete collection of `n_items`.
    pub fn validate_for(&self, n_items: usize) -> std::result::Result<(), InvalidInput> {
        self.validate()?;
        if n_items < 2 {
            return Err(InvalidInput::TooFewItems { n_items });
        }
        if self.k >= n_items {
            return Err(InvalidInput::NeighborsOutOfRange {
                k: self.k,
                n_items,
            });
        }
        if self.d >= n_items {
            return Err(InvalidInput::DimensionOutOfRange { d: self.d, n_items });
        }
        Ok(())
    }
}

pub struct KernelLleBuilder {
    params: EmbeddingParams,
    solver: Option<Box<dyn SpectralSolver>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Default for KernelLleBuilder {
    fn default() -> Self {
        debug!("Creating KernelLleBuilder with default parameters");
        Self {
            params: EmbeddingParams::default(),
            solver: None,
            cancel: None,
        }
    }
}

impl KernelLleBuilder {
    pub fn new() -> Self {
        info!("Initializing new KernelLleBuilder");
        Self::default()
    }

    /// Start from a full parameter set, e.g. one deserialised from a config file.
    pub fn from_params(params: EmbeddingParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    pub fn with_neighbors(mut self, k: usize) -> Self {
        info!("Setting neighbors per item: {}", k);
        self.params.k = k;
        self
    }

    pub fn with_target_dimension(mut self, d: usize) -> Self {
        info!("Setting target dimension: {}", d);
        self.params.d = d;
        self
    }

    /// Base shift and number of tenfold escalations for local Gram solves.
    pub fn with_reconstruction_shift(mut self, shift: f64, max_escalations: usize) -> Self {
        info!(
            "Setting reconstruction shift {:e} with up to {} escalations",
            shift, max_escalations
        );
        self.params.reconstruction_shift = shift;
        self.params.max_shift_escalations = max_escalations;
        self
    }

    pub fn with_eigenvalue_tolerance(mut self, tolerance: f64) -> Self {
        self.params.eigenvalue_tolerance = tolerance;
        self
    }

    /// Run on a dedicated pool of `threads` workers instead of the global one.
    pub fn with_threads(mut self, threads: usize) -> Self {
        info!("Setting worker threads: {}", threads);
        self.params.threads = Some(threads);
        self
    }

    pub fn with_solver(mut self, solver: impl SpectralSolver + 'static) -> Self {
        self.solver = Some(Box::new(solver));
        self
    }

    /// Flag checked between items; setting it aborts the run with `Cancelled`.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Validate the configuration eagerly.
    pub fn build(self) -> std::result::Result<KernelLle, InvalidInput> {
        self.params.validate()?;
        debug!("Build configuration: {:?}", self.params);
        Ok(KernelLle {
            params: self.params,
            solver: self.solver.unwrap_or_else(|| Box::new(DenseEigenSolver)),
            cancel: self.cancel,
        })
    }
}

/// A validated kernel LLE configuration, reusable across runs. No state is
/// kept between runs.
pub struct KernelLle {
    params: EmbeddingParams,
    solver: Box<dyn SpectralSolver>,
    cancel: Option<Arc<AtomicBool>>,
}

impl KernelLle {
    pub fn params(&self) -> &EmbeddingParams {
        &self.params
    }

    pub fn solver(&self) -> &dyn SpectralSolver {
        self.solver.as_ref()
    }

    /// Embed `n_items` items given only their pairwise similarity.
    ///
    /// Structural checks run before the provider is ever called. Any failure
    /// aborts the whole run; no partial embedding is returned.
    pub fn embed<S: Similarity + ?Sized>(&self, n_items: usize, similarity: &S) -> Result<Embedding> {
        info!(
            "Embedding {} items: k={}, d={}",
            n_items, self.params.k, self.params.d
        );
        self.params.validate_for(n_items)?;

        match self.params.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| InvalidInput::BadParameter {
                        name: "threads",
                        reason: e.to_string(),
                    })?;
                debug!("Running on dedicated pool of {} threads", threads);
                pool.install(|| self.run(n_items, similarity))
            }
            None => self.run(n_items, similarity),
        }
    }

    fn run<S: Similarity + ?Sized>(&self, n_items: usize, similarity: &S) -> Result<Embedding> {
        let mut kernel = KernelCache::new(similarity, n_items);
        if let Some(flag) = &self.cancel {
            kernel = kernel.with_cancellation(Arc::clone(flag));
        }

        let graph = self.neighbor_stage(&kernel)?;
        let weights = self.weight_stage(&kernel, &graph)?;
        let evaluations = kernel.evaluations();
        trace!("Kernel cache holds {} pairs", kernel.len());
        drop(kernel);

        // barrier: all per-item work is done before the eigensolve
        let m = self.alignment_stage(&graph, &weights);
        self.spectral_stage(&m, graph, weights, evaluations)
    }
}
