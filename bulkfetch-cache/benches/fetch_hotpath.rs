use bulkfetch_cache::{BulkCacheFetcher, MockCache};
use bulkfetch_core::{FetchResult, FetcherConfig, Identifier, Identifiers};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::Arc;

const BATCH: u32 = 1_000;

fn seeded(every: usize) -> Arc<MockCache<u32, u64>> {
    let cache = MockCache::new();
    for key in (0..BATCH).step_by(every) {
        cache.insert(key, u64::from(key) * 2);
    }
    Arc::new(cache)
}

fn lookup(missing: &[Identifier<u32>]) -> FetchResult<Vec<u64>> {
    Ok(missing.iter().map(|id| u64::from(*id.key()) * 2).collect())
}

fn bench_all_hits(c: &mut Criterion) {
    let fetcher = BulkCacheFetcher::with_defaults(seeded(1));

    c.bench_function("fetch/all_hits_1k", |b| {
        b.iter(|| {
            let objects = fetcher
                .fetch(Identifiers::from_keys(0..BATCH), &(), lookup)
                .expect("fetch cached batch");
            black_box(objects.len());
        });
    });
}

fn bench_half_misses(c: &mut Criterion) {
    c.bench_function("fetch/half_misses_1k", |b| {
        b.iter(|| {
            // Misses are written back, so each iteration needs a fresh cache.
            let fetcher = BulkCacheFetcher::with_defaults(seeded(2));
            let objects = fetcher
                .fetch(Identifiers::from_keys(0..BATCH), &(), lookup)
                .expect("fetch partial batch");
            black_box(objects.len());
        });
    });
}

fn bench_dedupe_misses(c: &mut Criterion) {
    let config = FetcherConfig::new().with_dedupe(true);

    c.bench_function("fetch/dedupe_repeated_misses_1k", |b| {
        b.iter(|| {
            let fetcher = BulkCacheFetcher::new(Arc::new(MockCache::new()), config.clone())
                .expect("build fetcher");
            let keys = (0..BATCH).map(|k| k % 50);
            let objects = fetcher
                .fetch(Identifiers::from_keys(keys), &(), lookup)
                .expect("fetch repeated batch");
            black_box(objects.len());
        });
    });
}

criterion_group!(
    benches,
    bench_all_hits,
    bench_half_misses,
    bench_dedupe_misses
);
criterion_main!(benches);
