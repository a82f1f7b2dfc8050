use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::prelude::*;
use rand::rngs::StdRng;

use vertpart::algo::{AlgorithmConfig, AlgorithmKind, create_algorithm};
use vertpart::cost::CostModelKind;
use vertpart::workload::Table;

/// Random workload: `queries` queries, each projecting a random non-empty
/// subset of `attributes` columns.
fn random_workload(attributes: usize, queries: usize, seed: u64) -> Table {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut t = Table::simple(attributes, 1_000_000);

    for q in 0..queries {
        let mut projected: Vec<usize> =
            (0..attributes).filter(|_| rng.gen_bool(0.3)).collect();
        if projected.is_empty() {
            projected.push(rng.gen_range(0..attributes));
        }
        t.add_projection_query(format!("q{q}"), rng.gen_range(1..=4), projected);
    }
    t
}

fn heuristics_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("heuristics");

    for &attributes in &[8, 12, 16] {
        let table = random_workload(attributes, 10, 42);

        for kind in [
            AlgorithmKind::AutoPart,
            AlgorithmKind::HillClimb,
            AlgorithmKind::Navathe,
            AlgorithmKind::O2p,
        ] {
            group.bench_with_input(
                BenchmarkId::new(format!("{kind:?}"), attributes),
                &table,
                |b, table| {
                    b.iter(|| {
                        let config =
                            AlgorithmConfig::new(table.clone(), CostModelKind::Disk);
                        let mut algo = create_algorithm(kind, config).unwrap();
                        algo.partition().unwrap()
                    });
                },
            );
        }
    }

    group.finish();
}

fn exhaustive_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("exhaustive");
    group.sample_size(10);

    // Bell numbers grow too fast for anything wider
    for &attributes in &[6, 8, 10] {
        let table = random_workload(attributes, 8, 7);

        group.bench_with_input(
            BenchmarkId::new("Optimal", attributes),
            &table,
            |b, table| {
                b.iter(|| {
                    let config = AlgorithmConfig::new(table.clone(), CostModelKind::Disk);
                    let mut algo = create_algorithm(AlgorithmKind::Optimal, config).unwrap();
                    algo.partition().unwrap()
                });
            },
        );
    }

    group.finish();
}

fn cost_model_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("cost_models");
    let table = random_workload(12, 10, 42);

    for cost_model in [
        CostModelKind::Disk,
        CostModelKind::DiskSelectivity,
        CostModelKind::Mem,
    ] {
        group.bench_with_input(
            BenchmarkId::new("HillClimb", format!("{cost_model:?}")),
            &table,
            |b, table| {
                b.iter(|| {
                    let config = AlgorithmConfig::new(table.clone(), cost_model);
                    let mut algo =
                        create_algorithm(AlgorithmKind::HillClimb, config).unwrap();
                    algo.partition().unwrap()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    heuristics_benchmark,
    exhaustive_benchmark,
    cost_model_benchmark
);
criterion_main!(benches);
