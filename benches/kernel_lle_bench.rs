use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use kernel_lle::builder::KernelLleBuilder;
use kernel_lle::graph::NeighborGraph;
use kernel_lle::kernel::KernelCache;
use kernel_lle::sequence::{MatchKernel, SequenceSet};
use rand::prelude::*;
use std::hint::black_box;
use std::time::Duration;

/// Random RNA-like sequences with a few shared motifs so neighborhoods have structure
fn generate_sequences(n_items: usize, length: usize, seed: u64) -> SequenceSet {
    let alphabet = [b'A', b'C', b'G', b'U'];
    let mut rng = StdRng::seed_from_u64(seed);
    let motifs: Vec<Vec<u8>> = (0..8)
        .map(|_| (0..length).map(|_| alphabet[rng.random_range(0..4)]).collect())
        .collect();

    let sequences = (0..n_items)
        .map(|i| {
            let motif = &motifs[i % motifs.len()];
            motif
                .iter()
                .map(|&s| {
                    if rng.random_bool(0.2) {
                        alphabet[rng.random_range(0..4)] as char
                    } else {
                        s as char
                    }
                })
                .collect()
        })
        .collect();
    SequenceSet::new(sequences)
}

pub fn criterion_benchmark(c: &mut Criterion) {
    // Group 1: neighbor search alone, dominated by kernel evaluations
    let mut group_graph = c.benchmark_group("neighbor_graph");
    group_graph.warm_up_time(Duration::from_millis(500));
    group_graph.measurement_time(Duration::from_secs(3));
    group_graph.sample_size(20);

    for &n in &[100, 250, 500] {
        let seqs = generate_sequences(n, 64, 42);
        group_graph.bench_function(BenchmarkId::new("items", n), |b| {
            b.iter_batched(
                || MatchKernel::new(&seqs),
                |sim| {
                    let kernel = KernelCache::new(&sim, n);
                    black_box(NeighborGraph::build(&kernel, 10).unwrap());
                },
                BatchSize::SmallInput,
            )
        });
    }
    group_graph.finish();

    // Group 2: full pipeline with varying k
    let mut group_full = c.benchmark_group("embed_full");
    group_full.warm_up_time(Duration::from_millis(500));
    group_full.measurement_time(Duration::from_secs(5));
    group_full.sample_size(10);

    let seqs = generate_sequences(300, 64, 7);
    for &k in &[5, 10, 30] {
        let lle = KernelLleBuilder::new()
            .with_neighbors(k)
            .with_target_dimension(2)
            .build()
            .unwrap();
        group_full.bench_function(BenchmarkId::new("k_variation", k), |b| {
            b.iter(|| black_box(lle.embed(seqs.len(), &MatchKernel::new(&seqs)).unwrap()))
        });
    }
    group_full.finish();

    // Group 3: thread scaling on the full pipeline
    let mut group_threads = c.benchmark_group("embed_threads");
    group_threads.sample_size(10);
    for &threads in &[1, 2, 4] {
        let lle = KernelLleBuilder::new()
            .with_neighbors(10)
            .with_target_dimension(2)
            .with_threads(threads)
            .build()
            .unwrap();
        group_threads.bench_function(BenchmarkId::new("threads", threads), |b| {
            b.iter(|| black_box(lle.embed(seqs.len(), &MatchKernel::new(&seqs)).unwrap()))
        });
    }
    group_threads.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
