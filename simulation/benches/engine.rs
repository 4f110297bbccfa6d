//! Avalanche engine benchmarks
//!
//! - Single-layer runs on fixture networks of increasing size
//! - Coupled runs across coupling probabilities
//! - Coupled graph construction
//!
//! Run with: cargo bench -p sandpile-simulation

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use sandpile_simulation::{
    AvalancheEngine, CoupledAvalancheEngine, CoupledConfig, CoupledGraphBuilder, EngineConfig,
    GraphBuilder,
};

const ITERATIONS: u64 = 100_000;

// ============================================================================
// Single-layer Benchmarks
// ============================================================================

fn bench_single_layer(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_layer");
    group.throughput(Throughput::Elements(ITERATIONS));
    group.sample_size(20);

    for nodes in [1_000usize, 10_000] {
        let graph = GraphBuilder::new(nodes)
            .random_regular(3, &mut StdRng::seed_from_u64(1))
            .unwrap();
        let config = EngineConfig::new(1.0 / nodes as f64, ITERATIONS);

        group.bench_with_input(BenchmarkId::new("random_regular_3", nodes), &graph, |b, g| {
            b.iter(|| {
                let mut engine =
                    AvalancheEngine::new(g, config, StdRng::seed_from_u64(7)).unwrap();
                black_box(engine.run_to_vec())
            })
        });
    }

    let graph = GraphBuilder::new(2_000).erdos_renyi(0.002, &mut StdRng::seed_from_u64(1));
    let config = EngineConfig::new(0.01, ITERATIONS);
    group.bench_function("erdos_renyi_2000", |b| {
        b.iter(|| {
            let mut engine =
                AvalancheEngine::new(&graph, config, StdRng::seed_from_u64(7)).unwrap();
            black_box(engine.run_to_vec())
        })
    });

    group.finish();
}

// ============================================================================
// Coupled Benchmarks
// ============================================================================

fn bench_coupled(c: &mut Criterion) {
    let mut group = c.benchmark_group("coupled");
    group.throughput(Throughput::Elements(ITERATIONS));
    group.sample_size(20);

    let mut rng = StdRng::seed_from_u64(3);
    let lower = GraphBuilder::new(2_000).random_regular(3, &mut rng).unwrap();
    let upper = GraphBuilder::new(2_000).random_regular(3, &mut rng).unwrap();

    for p in [0.01, 0.1, 0.5] {
        let coupled = CoupledGraphBuilder::new(2_000, p)
            .build(&lower, &upper, &mut rng)
            .unwrap();
        let config = CoupledConfig::new(p, EngineConfig::new(0.01, ITERATIONS));

        group.bench_with_input(BenchmarkId::new("run", p), &coupled, |b, coupled| {
            b.iter(|| {
                let mut engine =
                    CoupledAvalancheEngine::new(coupled, config, StdRng::seed_from_u64(7))
                        .unwrap();
                black_box(engine.run_to_vec())
            })
        });
    }

    group.bench_function("build_p_0.1", |b| {
        let mut rng = StdRng::seed_from_u64(5);
        b.iter(|| {
            CoupledGraphBuilder::new(2_000, black_box(0.1))
                .build(&lower, &upper, &mut rng)
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_single_layer, bench_coupled);
criterion_main!(benches);
