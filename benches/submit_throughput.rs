//! Benchmarks for submission and result delivery

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fixpool::prelude::*;

fn bench_submit_wait(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_wait");

    for threads in [1usize, 2, 4, 8] {
        let pool = Pool::new(threads).unwrap();
        pool.start().unwrap();

        group.bench_with_input(BenchmarkId::new("batch_1000", threads), &pool, |b, pool| {
            b.iter(|| {
                let handles: Vec<_> = (0..1000u64)
                    .map(|i| pool.submit(move || black_box(i) * 2).unwrap())
                    .collect();
                handles.iter().map(|h| h.wait().unwrap()).sum::<u64>()
            })
        });

        pool.shutdown(ShutdownMode::Graceful);
    }

    group.finish();
}

fn bench_single_roundtrip(c: &mut Criterion) {
    let pool = Pool::new(2).unwrap();
    pool.start().unwrap();

    c.bench_function("single_roundtrip", |b| {
        b.iter(|| pool.submit(|| black_box(4 * 4)).unwrap().wait().unwrap())
    });
}

criterion_group!(benches, bench_submit_wait, bench_single_roundtrip);
criterion_main!(benches);
