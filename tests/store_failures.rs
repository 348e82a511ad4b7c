mod common;

use common::test_helpers::FlakyStore;
use dripfeed::clock::ManualClock;
use dripfeed::telemetry::{BucketEvent, MemorySink};
use dripfeed::{BucketStore, Consistency, LeakyBucket, LimiterConfig, LimiterError};
use std::error::Error;

fn flaky_limiter(consistency: Consistency) -> (LeakyBucket<FlakyStore, MemorySink>, FlakyStore, MemorySink) {
    let store = FlakyStore::default();
    let sink = MemorySink::new();
    let config = LimiterConfig::new(5, 1.0)
        .expect("valid config")
        .with_consistency(consistency)
        .expect("valid consistency");
    let limiter = LeakyBucket::with_store(config, store.clone())
        .with_clock(ManualClock::new(10.0))
        .with_sink(sink.clone());
    (limiter, store, sink)
}

#[tokio::test]
async fn write_error_surfaces_as_persistence_error() {
    let (limiter, store, sink) = flaky_limiter(Consistency::default());
    store.fail_writes(true);

    let err = limiter.increment_usage("ns").await.expect_err("write should fail");
    assert!(err.is_persistence());
    assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("disk full"));
    assert_eq!(sink.events(), vec![BucketEvent::PersistFailed { namespace: "ns".into() }]);
    assert!(store.inner.is_empty());
}

#[tokio::test]
async fn leak_write_failure_fails_plain_reads() {
    let (limiter, store, _sink) = flaky_limiter(Consistency::default());
    limiter.increment_usage_by("ns", 3).await.unwrap();

    store.fail_writes(true);
    let err = limiter.usage("ns").await.expect_err("persisting the leak should fail");
    assert!(matches!(err, LimiterError::BucketPersistence { .. }));

    store.fail_writes(false);
    assert_eq!(limiter.usage("ns").await.unwrap(), 3);
}

#[tokio::test]
async fn refused_write_without_guard_is_persistence_error() {
    let (limiter, store, _sink) = flaky_limiter(Consistency::LastWriteWins);
    store.refuse_writes(true);

    let err = limiter.increment_usage("ns").await.expect_err("store refused");
    match err {
        LimiterError::BucketPersistence { namespace, source } => {
            assert_eq!(namespace, "ns");
            assert!(source.is_none());
        }
        other => panic!("expected persistence error, got {other:?}"),
    }
}

#[tokio::test]
async fn refused_conditional_write_reads_as_contention() {
    let (limiter, store, sink) = flaky_limiter(Consistency::Optimistic { max_attempts: 2 });
    store.refuse_writes(true);

    let err = limiter.increment_usage("ns").await.expect_err("every swap refused");
    assert!(matches!(err, LimiterError::Contended { attempts: 2, .. }));
    let contended = sink.events().iter().filter(|e| matches!(e, BucketEvent::Contended { .. })).count();
    assert_eq!(contended, 2);
}

#[tokio::test]
async fn read_failure_is_reported_with_source() {
    let (limiter, store, _sink) = flaky_limiter(Consistency::default());
    store.fail_reads(true);

    let err = limiter.remaining("ns").await.expect_err("read should fail");
    assert!(matches!(err, LimiterError::StorageRead { .. }));
    assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("cache unreachable"));
}

#[tokio::test]
async fn last_write_wins_sets_then_replaces() {
    let (limiter, store, _sink) = flaky_limiter(Consistency::LastWriteWins);
    assert_eq!(limiter.increment_usage("ns").await.unwrap(), 1);
    assert!(store.has_item("ns").await.unwrap());
    assert_eq!(limiter.increment_usage("ns").await.unwrap(), 2);

    // record evicted between calls: the next increment starts from a fresh bucket
    store.inner.remove("ns");
    assert_eq!(limiter.increment_usage_by("ns", 4).await.unwrap(), 4);
    assert_eq!(limiter.usage("ns").await.unwrap(), 4);
}
