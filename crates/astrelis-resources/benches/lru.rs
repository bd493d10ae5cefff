//! Benchmarks for LRU eviction candidate selection

use astrelis_core::collections::HashSet;
use astrelis_resources::{AssetId, LruCacheManager, UntypedAssetId};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

const KB: usize = 1024;

fn id(index: u32) -> UntypedAssetId {
    UntypedAssetId::of::<Vec<u8>>(AssetId::new(index, 1))
}

/// A tracker holding `count` 64 KB entries with distinct access times.
fn populated(count: u32) -> LruCacheManager {
    let lru = LruCacheManager::with_max_bytes(usize::MAX);
    for i in 0..count {
        lru.record_access_at(id(i), 64 * KB, u64::from(i));
    }
    lru
}

fn bench_record_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("lru_record_access");

    for size in [100u32, 1000, 10000] {
        group.throughput(Throughput::Elements(u64::from(size)));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| populated(black_box(size)));
        });
    }

    group.finish();
}

fn bench_eviction_candidates(c: &mut Criterion) {
    let mut group = c.benchmark_group("lru_eviction_candidates");

    for size in [100u32, 1000, 10000] {
        let lru = populated(size);
        let total = size as usize * 64 * KB;
        let none = HashSet::default();

        group.throughput(Throughput::Elements(u64::from(size)));

        // Free a quarter of the tracked memory
        group.bench_with_input(BenchmarkId::new("quarter", size), &total, |b, &total| {
            b.iter(|| lru.candidates_for_bytes(black_box(total / 4 * 3), &none));
        });

        // Every other entry pinned
        let pinned: HashSet<UntypedAssetId> = (0..size).step_by(2).map(id).collect();
        group.bench_with_input(BenchmarkId::new("half_pinned", size), &total, |b, &total| {
            b.iter(|| lru.candidates_for_bytes(black_box(total / 4 * 3), &pinned));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_record_access, bench_eviction_candidates);
criterion_main!(benches);
