//! Benchmarks for Vigil Graph Partitioning
//!
//! Measures performance of:
//! - Spectral bisection and k-means at different grid sizes
//! - Christofides tour ordering

use std::collections::BTreeSet;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use vigil_partition::{patrol_cycle, Partitioner, SingleCycle, SpectralBisection, SpectralKMeans};
use vigil_topology::WaypointGraph;

/// Benchmark each strategy splitting a grid among 4 agents
fn bench_partitioners(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");

    for &side in &[4u32, 8, 12] {
        let graph = WaypointGraph::grid(side, side, 10).unwrap();
        group.throughput(Throughput::Elements(u64::from(side * side)));

        group.bench_with_input(BenchmarkId::new("bisection", side), &graph, |b, g| {
            b.iter(|| SpectralBisection::new().partition(black_box(g), 4))
        });
        group.bench_with_input(BenchmarkId::new("kmeans", side), &graph, |b, g| {
            b.iter(|| SpectralKMeans::new(7).partition(black_box(g), 4))
        });
        group.bench_with_input(BenchmarkId::new("single_cycle", side), &graph, |b, g| {
            b.iter(|| SingleCycle::new().partition(black_box(g), 4))
        });
    }
    group.finish();
}

/// Benchmark tour ordering over a whole grid
fn bench_christofides(c: &mut Criterion) {
    let mut group = c.benchmark_group("christofides");

    for &side in &[5u32, 10, 15] {
        let graph = WaypointGraph::grid(side, side, 10).unwrap();
        let all: BTreeSet<_> = graph.vertex_ids().collect();
        group.bench_with_input(BenchmarkId::from_parameter(side), &all, |b, vertices| {
            b.iter(|| patrol_cycle(&graph, black_box(vertices)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_partitioners, bench_christofides);
criterion_main!(benches);
