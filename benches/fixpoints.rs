//! CTL fixpoint benchmarks on random graphs.
//!
//! Run with:
//! ```bash
//! cargo bench --bench fixpoints
//! ```

use std::rc::Rc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use measure_rs::bitset::BitSet;
use measure_rs::cancel::CancelFlag;
use measure_rs::ctl::{ExplicitCtl, Fixpoints, SymbolicCtl};
use measure_rs::dd::{Forest, ForestConfig};
use measure_rs::graph::{Direction, ExplicitGraph, ReachabilityGraph, SymbolicGraph};
use measure_rs::report::NullObserver;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

// ============================================================================
// Helper: random graph with a fixed out-degree
// ============================================================================

fn random_graph(n: usize, degree: usize, seed: u64) -> ExplicitGraph {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let edges: Vec<(usize, usize)> = (0..n)
        .flat_map(|s| (0..degree).map(move |_| s))
        .map(|s| (s, rng.gen_range(0..n)))
        .collect();
    ExplicitGraph::new(n, [0], edges).unwrap()
}

fn random_set(n: usize, density: f64, seed: u64) -> BitSet {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    BitSet::from_indices(n, (0..n).filter(|_| rng.gen_bool(density)))
}

// ============================================================================
// Benchmark: EU on both representations
// ============================================================================

fn bench_eu(c: &mut Criterion) {
    let mut group = c.benchmark_group("ctl/eu");
    group.sample_size(10);
    let cancel = CancelFlag::new();

    for n in [256, 1024, 4096] {
        let explicit = random_graph(n, 2, 42);
        let p = random_set(n, 0.7, 1);
        let q = random_set(n, 0.01, 2);

        group.bench_with_input(BenchmarkId::new("explicit", n), &n, |b, _| {
            let ctl = ExplicitCtl::new(&explicit, &cancel, &NullObserver);
            b.iter(|| ctl.eu(Direction::Backward, Some(&p), &q).unwrap());
        });

        let forest = Rc::new(Forest::new(ForestConfig::default()));
        let symbolic = SymbolicGraph::encode(&explicit, forest).unwrap();
        let sp = symbolic.from_indices(&p.iter().collect::<Vec<_>>()).unwrap().edge().unwrap();
        let sq = symbolic.from_indices(&q.iter().collect::<Vec<_>>()).unwrap().edge().unwrap();
        group.bench_with_input(BenchmarkId::new("symbolic", n), &n, |b, _| {
            let ctl = SymbolicCtl::new(&symbolic, &cancel, &NullObserver);
            b.iter(|| ctl.eu(Direction::Backward, Some(&sp), &sq).unwrap());
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: EG, plain and fair
// ============================================================================

fn bench_eg(c: &mut Criterion) {
    let mut group = c.benchmark_group("ctl/eg");
    group.sample_size(10);
    let cancel = CancelFlag::new();

    for n in [256, 1024] {
        let explicit = random_graph(n, 2, 7);
        let p = random_set(n, 0.8, 3);
        let ctl = ExplicitCtl::new(&explicit, &cancel, &NullObserver);

        group.bench_with_input(BenchmarkId::new("unfair", n), &n, |b, _| {
            b.iter(|| ctl.unfair_eg(Direction::Backward, &p).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("fair", n), &n, |b, _| {
            b.iter(|| ctl.fair_eg(Direction::Backward, &p).unwrap());
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: AEF, attractor against iteration
// ============================================================================

fn bench_aef(c: &mut Criterion) {
    let mut group = c.benchmark_group("ctl/aef");
    group.sample_size(10);
    let cancel = CancelFlag::new();

    for n in [256, 1024, 4096] {
        let explicit = random_graph(n, 3, 11);
        let p = random_set(n, 0.5, 4);
        let q = random_set(n, 0.02, 5);
        let ctl = ExplicitCtl::new(&explicit, &cancel, &NullObserver);

        group.bench_with_input(BenchmarkId::new("attractor", n), &n, |b, _| {
            b.iter(|| ctl.aef_attractor(&p, &q).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("iterative", n), &n, |b, _| {
            b.iter(|| ctl.aef_iterative(&p, &q).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_eu, bench_eg, bench_aef);

criterion_main!(benches);
