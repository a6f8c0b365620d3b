//! Size-class pool benchmarks.
//!
//! Run with: `cargo bench --bench pool`

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use poolcache::store::pool::PoolAllocator;
use poolcache::traits::Allocator;

const SLOTS: usize = 1024;

// ============================================================================
// Allocate / Deallocate
// ============================================================================

fn bench_allocate_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_release");

    // prefilled slots push the first free bit further into the bitmap
    for fill in [0usize, SLOTS / 2, SLOTS - 1] {
        group.bench_with_input(BenchmarkId::new("prefilled", fill), &fill, |b, &fill| {
            let mut pool = PoolAllocator::new(SLOTS * 8, [8]).unwrap();
            let _held: Vec<_> = (0..fill).map(|_| pool.allocate(8).unwrap()).collect();
            b.iter(|| {
                let handle = pool.allocate(8).unwrap();
                pool.deallocate(black_box(handle)).unwrap();
            })
        });
    }
    group.finish();
}

// ============================================================================
// Typed Create / Destroy
// ============================================================================

fn bench_create_destroy(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_destroy");
    group.throughput(Throughput::Elements(SLOTS as u64));

    group.bench_function("string", |b| {
        let size = size_of::<String>();
        let mut pool = PoolAllocator::new(SLOTS * size, [size]).unwrap();
        b.iter(|| {
            let values: Vec<_> = (0..SLOTS)
                .map(|i| pool.create(i.to_string()).unwrap())
                .collect();
            for value in values {
                pool.destroy(value).unwrap();
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_allocate_release, bench_create_destroy);
criterion_main!(benches);
