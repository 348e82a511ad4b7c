//! Compile-time prelude coverage test.
use dripfeed::prelude::*;

#[tokio::test]
async fn prelude_reexports_core_types() {
    let config = LimiterConfig::new(3, 1.0)
        .expect("valid config")
        .with_consistency(Consistency::LastWriteWins)
        .expect("valid consistency");
    let limiter = LeakyBucket::with_store(config, InMemoryBucketStore::new())
        .with_clock(ManualClock::new(0.0))
        .with_sink(MemorySink::new());

    let decision = limiter.acquire("ns", 1).await.expect("acquire failed");
    assert!(matches!(decision, Decision::Allowed { usage: 1, remaining: 2 }));

    let status: BucketStatus = limiter.status("ns").await.expect("status failed");
    assert_eq!(status.usage, 1);
    let _: Option<LimiterError> = None;
    let _: Option<ConfigError> = None;
}
