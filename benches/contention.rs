//! Throughput benchmarks for the pool and key cache hot paths.

use std::collections::HashMap;
use std::hint::black_box;
use std::time::Duration;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};

use poolkit::config::{KeyCacheConfig, PoolConfig};
use poolkit::key_cache::KeyCache;
use poolkit::pool::ObjectPool;

const OPS: u64 = 100_000;

fn quiet_pool_config() -> PoolConfig {
    // Long interval keeps the maintenance task out of the measurement.
    PoolConfig::default().with_trim_interval(Duration::from_secs(3600))
}

fn quiet_cache_config() -> KeyCacheConfig {
    KeyCacheConfig::default().with_trim_interval(Duration::from_secs(3600))
}

fn bench_pool_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_cycle");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("acquire_release_hit", |b| {
        let pool: ObjectPool<HashMap<u64, u64>> = ObjectPool::new(quiet_pool_config()).unwrap();
        // Prime one idle instance so every cycle reuses.
        let primed = pool.acquire();
        pool.release(primed);

        b.iter(|| {
            for _ in 0..OPS {
                let instance = pool.acquire();
                pool.release(black_box(instance));
            }
        })
    });

    group.bench_function("acquire_release_populated", |b| {
        let pool: ObjectPool<HashMap<u64, u64>> = ObjectPool::new(quiet_pool_config()).unwrap();

        b.iter(|| {
            for i in 0..OPS {
                let mut instance = pool.acquire();
                instance.insert(i, i);
                pool.release(black_box(instance));
            }
        })
    });

    group.finish();
}

fn bench_key_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_cache");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("get_or_create_hit", |b| {
        let cache: KeyCache<u64, String, _> =
            KeyCache::new(quiet_cache_config(), |token: &u64| token.to_string()).unwrap();
        for token in 0..64_u64 {
            black_box(cache.get_or_create(&token));
        }

        b.iter(|| {
            for i in 0..OPS {
                let token = i % 64;
                black_box(cache.get_or_create(&token));
            }
        })
    });

    group.bench_function("get_or_create_churn", |b| {
        let cache: KeyCache<u64, String, _> = KeyCache::new(
            quiet_cache_config().with_capacity(256).with_min_floor(16),
            |token: &u64| token.to_string(),
        )
        .unwrap();

        b.iter(|| {
            for i in 0..OPS {
                // Token space twice the capacity forces steady eviction.
                let token = i % 512;
                black_box(cache.get_or_create(&token));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_pool_cycle, bench_key_cache);
criterion_main!(benches);
