use bytes::Bytes;
use core::{hint::black_box, num::NonZeroUsize};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use genserve_core::{GenerationCache, RawFormat, segment};
use std::sync::Arc;
use std::thread::scope;

const MAX_SEGMENT_SIZE: NonZeroUsize = NonZeroUsize::new(8_800).unwrap();

fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("split");
    for len in [1_024_usize, 10_000, 1 << 20] {
        let input = Bytes::from(vec![0xAB_u8; len]);
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_function(format!("{len}_bytes"), |b| {
            b.iter(|| black_box(segment::split(black_box(&input), MAX_SEGMENT_SIZE)));
        });
    }
    group.finish();
}

fn bench_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache");
    group.throughput(Throughput::Elements(1));

    let cache = GenerationCache::new(NonZeroUsize::new(64).unwrap());
    for _ in 0..64 {
        cache.add(Bytes::from_static(&[0_u8; 32])).unwrap();
    }

    group.bench_function("add_evict", |b| {
        b.iter(|| black_box(cache.add(Bytes::from_static(&[1_u8; 32]))));
    });

    group.bench_function("latest", |b| {
        b.iter(|| black_box(cache.latest()));
    });

    group.bench_function("get", |b| {
        b.iter(|| {
            let latest = cache.latest().map_or(0, |entry| entry.generation());
            black_box(cache.get(black_box(latest.saturating_sub(32))))
        });
    });

    group.bench_function("encoded_memoized", |b| {
        let entry = cache.add(Bytes::from(vec![0_u8; 10_000])).unwrap();
        b.iter(|| black_box(entry.encoded(&RawFormat, MAX_SEGMENT_SIZE)));
    });

    group.finish();
}

fn bench_contended_reads(c: &mut Criterion) {
    let cache = Arc::new(GenerationCache::new(NonZeroUsize::new(8).unwrap()));
    cache.add(Bytes::from(vec![0_u8; 10_000])).unwrap();

    c.bench_function("contended_latest_4_threads", |b| {
        b.iter(|| {
            scope(|s| {
                for _ in 0..4 {
                    s.spawn(|| {
                        for _ in 0..256 {
                            black_box(cache.latest());
                        }
                    });
                }
            });
        });
    });
}

criterion_group!(benches, bench_split, bench_cache, bench_contended_reads);
criterion_main!(benches);
