//! # Sync Benchmark
//!
//! Reconciliation cost must track the number of dirty cells, not the grid
//! area. This benchmark measures:
//! 1. A pass over a fixed number of dirty cells on growing grids
//! 2. A pass over a growing fraction of dirty cells on one grid
//! 3. The write path alone (no reconciliation)

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sandgrid_core::{AllocationMonitor, Connector, Particle, ParticleKind, SyncConfig};

fn world(size: u32) -> Connector {
    Connector::with_config(size, size, SyncConfig::default(), AllocationMonitor::new())
        .expect("default config is valid")
}

/// Scatters `count` sand particles and reconciles them.
fn seeded(size: u32, count: usize, seed: u64) -> Connector {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut connector = world(size);
    let limit = size as i32;
    for _ in 0..count {
        let (x, y) = (rng.gen_range(0..limit), rng.gen_range(0..limit));
        let _ = connector.add_particle(x, y, Particle::from(ParticleKind::Sand));
    }
    connector.update();
    connector
}

/// Moves up to `moves` random occupants down one row.
fn churn(connector: &mut Connector, moves: usize, seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let limit = connector.width() as i32;
    for _ in 0..moves {
        let (x, y) = (rng.gen_range(0..limit), rng.gen_range(0..limit - 1));
        connector.move_particle(x, y, x, y + 1);
    }
}

/// Fixed dirty count, growing area: time should stay flat.
fn bench_sync_vs_area(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync_fixed_dirty");

    for size in [256u32, 1024, 2048] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let mut connector = seeded(size, 20_000, 7);
                    churn(&mut connector, 20_000, 11);
                    connector
                },
                |mut connector| black_box(connector.batch_sync_dirty_states()),
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

/// Growing dirty count on one grid: time should grow linearly.
fn bench_sync_vs_dirty(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync_dirty_fraction");

    for moves in [1_000usize, 10_000, 100_000] {
        group.throughput(criterion::Throughput::Elements(moves as u64));
        group.bench_with_input(BenchmarkId::from_parameter(moves), &moves, |b, &moves| {
            b.iter_batched(
                || {
                    let mut connector = seeded(1024, 200_000, 3);
                    churn(&mut connector, moves, 5);
                    connector
                },
                |mut connector| black_box(connector.update()),
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_write_path(c: &mut Criterion) {
    let mut connector = seeded(1024, 200_000, 13);
    let mut rng = ChaCha8Rng::seed_from_u64(17);

    c.bench_function("move_particle", |b| {
        b.iter(|| {
            let (x, y) = (rng.gen_range(0..1024), rng.gen_range(0..1023));
            black_box(connector.move_particle(x, y, x, y + 1))
        });
    });
}

criterion_group!(benches, bench_sync_vs_area, bench_sync_vs_dirty, bench_write_path);
criterion_main!(benches);
