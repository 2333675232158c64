use std::sync::{Arc, Mutex};

use approx::assert_relative_eq;
use smartcore::linalg::basic::arrays::Array;
use sprs::TriMat;

use crate::builder::KernelLleBuilder;
use crate::eigenmaps::{
    assemble_embedding, count_near_zero, DenseEigenSolver, EigenPairs, EmbeddingStages,
    SpectralSolver,
};
use crate::error::{EmbeddingError, NumericalError, Result};
use crate::kernel::KernelCache;
use crate::laplacian::AlignmentMatrix;
use crate::sequence::{MatchKernel, SequenceSet};
use crate::tests::init;
use crate::tests::test_data::{four_sequences, random_sequences, CountingSimilarity};

fn tridiagonal(n: usize) -> AlignmentMatrix {
    let mut t: TriMat<f64> = TriMat::new((n, n));
    for i in 0..n {
        t.add_triplet(i, i, 2.0);
        if i + 1 < n {
            t.add_triplet(i, i + 1, -1.0);
            t.add_triplet(i + 1, i, -1.0);
        }
    }
    AlignmentMatrix {
        matrix: t.to_csr(),
    }
}

#[test]
fn test_dense_solver_smallest_pairs() {
    init();
    let m = tridiagonal(3);
    let pairs = DenseEigenSolver.smallest_eigenpairs(&m, 2).unwrap();

    assert_eq!(pairs.len(), 2);
    assert_relative_eq!(pairs.values[0], 2.0 - 2.0_f64.sqrt(), epsilon = 1e-10);
    assert_relative_eq!(pairs.values[1], 2.0, epsilon = 1e-10);

    // second mode is (1, 0, -1) / sqrt(2) up to sign
    let v = &pairs.vectors[1];
    assert_relative_eq!(v[1], 0.0, epsilon = 1e-10);
    assert_relative_eq!(v[0].abs(), 1.0 / 2.0_f64.sqrt(), epsilon = 1e-10);
    assert_relative_eq!(v[0], -v[2], epsilon = 1e-10);

    for v in &pairs.vectors {
        let norm: f64 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-10);
    }
}

#[test]
fn test_dense_solver_rejects_oversized_request() {
    init();
    let m = tridiagonal(3);
    assert!(matches!(
        DenseEigenSolver.smallest_eigenpairs(&m, 4),
        Err(EmbeddingError::Numerical(NumericalError::EigenSolver(_)))
    ));
}

#[test]
fn test_assemble_skips_constant_mode() {
    init();
    let pairs = EigenPairs {
        values: vec![0.0, 0.1, 0.3],
        vectors: vec![
            vec![0.5, 0.5, 0.5, 0.5],
            vec![0.5, 0.5, -0.5, -0.5],
            vec![0.5, -0.5, 0.5, -0.5],
        ],
    };
    let coords = assemble_embedding(&pairs, 2).unwrap();
    assert_eq!(coords.shape(), (4, 2));
    assert_eq!(*coords.get((2, 0)), -0.5);
    assert_eq!(*coords.get((1, 1)), -0.5);

    assert!(assemble_embedding(&pairs, 3).is_err());
}

#[test]
fn test_count_near_zero() {
    init();
    // the first value is the expected constant mode and is never counted
    assert_eq!(count_near_zero(&[0.0, 1e-14, 0.2], 1e-9, 1.5), 1);
    assert_eq!(count_near_zero(&[0.0, 1e-3, 0.2], 1e-9, 1.5), 0);
    // scale below one does not tighten the threshold
    assert_eq!(count_near_zero(&[0.0, 5e-10], 1e-9, 1e-6), 1);
}

/// Delegates to the dense solver and records each requested count.
struct RecordingSolver {
    requested: Arc<Mutex<Vec<usize>>>,
}

impl SpectralSolver for RecordingSolver {
    fn smallest_eigenpairs(&self, m: &AlignmentMatrix, count: usize) -> Result<EigenPairs> {
        self.requested.lock().unwrap().push(count);
        DenseEigenSolver.smallest_eigenpairs(m, count)
    }
}

#[test]
fn test_custom_solver_receives_d_plus_one() {
    init();
    let seqs = SequenceSet::new(random_sequences(15, 12, b"ACGU", 4));
    let sim = MatchKernel::new(&seqs);

    let requested = Arc::new(Mutex::new(Vec::new()));
    let lle = KernelLleBuilder::new()
        .with_neighbors(4)
        .with_target_dimension(3)
        .with_solver(RecordingSolver {
            requested: Arc::clone(&requested),
        })
        .build()
        .unwrap();
    let embedding = lle.embed(seqs.len(), &sim).unwrap();

    assert_eq!(embedding.shape(), (15, 3));
    assert_eq!(*requested.lock().unwrap(), vec![4]);
}

#[test]
fn test_stages_match_one_shot() {
    init();
    let seqs = random_sequences(30, 16, b"ACGU", 12);
    let lle = KernelLleBuilder::new()
        .with_neighbors(6)
        .with_target_dimension(2)
        .build()
        .unwrap();

    let sim = CountingSimilarity::new(seqs.clone());
    let one_shot = lle.embed(30, &sim).unwrap();

    let sim = CountingSimilarity::new(seqs);
    let kernel = KernelCache::new(&sim, 30);
    let graph = lle.neighbor_stage(&kernel).unwrap();
    let weights = lle.weight_stage(&kernel, &graph).unwrap();
    let m = lle.alignment_stage(&graph, &weights);
    let staged = lle
        .spectral_stage(&m, graph, weights, kernel.evaluations())
        .unwrap();

    assert_eq!(one_shot.neighbors, staged.neighbors);
    assert_eq!(one_shot.weights, staged.weights);
    assert_eq!(one_shot.kernel_evaluations, staged.kernel_evaluations);
    for i in 0..30 {
        for c in 0..2 {
            assert_relative_eq!(one_shot.get(i, c), staged.get(i, c), epsilon = 1e-10);
        }
    }
    for (a, b) in one_shot.eigenvalues.iter().zip(staged.eigenvalues.iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-12);
    }
}

/// Returns the same eigenpairs regardless of the matrix.
struct FixedSolver {
    pairs: EigenPairs,
}

impl SpectralSolver for FixedSolver {
    fn smallest_eigenpairs(&self, _m: &AlignmentMatrix, _count: usize) -> Result<EigenPairs> {
        Ok(self.pairs.clone())
    }
}

fn embed_four_with(second: Vec<f64>) -> Result<crate::eigenmaps::Embedding> {
    let seqs = four_sequences();
    let sim = MatchKernel::new(&seqs);
    KernelLleBuilder::new()
        .with_neighbors(2)
        .with_target_dimension(1)
        .with_solver(FixedSolver {
            pairs: EigenPairs {
                values: vec![0.0, 0.25],
                vectors: vec![vec![1.0, 1.0, 1.0, 1.0], second],
            },
        })
        .build()
        .unwrap()
        .embed(seqs.len(), &sim)
}

#[test]
fn test_solver_vectors_are_renormalised() {
    init();
    let embedding = embed_four_with(vec![2.0, 2.0, -2.0, -2.0]).unwrap();
    let expected = [0.5, 0.5, -0.5, -0.5];
    for (i, e) in expected.iter().enumerate() {
        assert_relative_eq!(embedding.get(i, 0), *e, epsilon = 1e-12);
    }
    assert_relative_eq!(embedding.eigenvalues[0], 0.25);
}

#[test]
fn test_non_finite_solver_vector_rejected() {
    init();
    assert!(matches!(
        embed_four_with(vec![0.5, f64::NAN, -0.5, -0.5]),
        Err(EmbeddingError::Numerical(NumericalError::NonFiniteEigenvector(1)))
    ));
}

#[test]
fn test_zero_solver_vector_rejected() {
    init();
    assert!(matches!(
        embed_four_with(vec![0.0; 4]),
        Err(EmbeddingError::Numerical(NumericalError::NonFiniteEigenvector(1)))
    ));
}

#[test]
fn test_wrong_length_solver_vector_rejected() {
    init();
    assert!(matches!(
        embed_four_with(vec![1.0, -1.0]),
        Err(EmbeddingError::Numerical(NumericalError::NonFiniteEigenvector(1)))
    ));
}
