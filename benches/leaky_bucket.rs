use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dripfeed::bucket::Bucket;
use dripfeed::{InMemoryBucketStore, LeakyBucket, LimiterConfig};

fn leak_and_fill(c: &mut Criterion) {
    c.bench_function("bucket_leak_fill", |b| {
        let bucket = Bucket::new(500, 1_000.0).unwrap();
        b.iter(|| black_box(bucket).leak(black_box(1_002.5), 10.0).fill(1, 1_000, 1_002.5))
    });
}

fn record_codec(c: &mut Criterion) {
    let encoded = Bucket::new(42, 1_760_000_000.25).unwrap().encode();
    c.bench_function("bucket_record_decode", |b| b.iter(|| Bucket::decode(black_box(&encoded))));
}

fn increment_in_memory(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    // leak fast enough that the bucket never fills
    let config = LimiterConfig::new(u64::MAX, 1e12).unwrap();
    let limiter = LeakyBucket::with_store(config, InMemoryBucketStore::new());

    c.bench_function("increment_usage_in_memory", |b| {
        b.to_async(&rt).iter(|| async { limiter.increment_usage(black_box("bench")).await.unwrap() })
    });
}

criterion_group!(benches, leak_and_fill, record_codec, increment_in_memory);
criterion_main!(benches);
