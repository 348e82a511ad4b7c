#![allow(dead_code)]

use async_trait::async_trait;
use dripfeed::clock::ManualClock;
use dripfeed::{BucketStore, InMemoryBucketStore, LeakyBucket, LimiterConfig};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Build an engine over a fresh in-memory store with a manual clock at t=1000s.
pub fn manual_limiter(
    capacity: u64,
    leak_rate: f64,
) -> (LeakyBucket<InMemoryBucketStore>, InMemoryBucketStore, ManualClock) {
    let store = InMemoryBucketStore::new();
    let clock = ManualClock::new(1_000.0);
    let config = LimiterConfig::new(capacity, leak_rate).expect("valid config");
    let limiter = LeakyBucket::with_store(config, store.clone()).with_clock(clock.clone());
    (limiter, store, clock)
}

/// Yields to the executor before every operation so concurrent callers interleave.
#[derive(Clone, Debug, Default)]
pub struct YieldingStore {
    pub inner: InMemoryBucketStore,
}

#[async_trait]
impl BucketStore for YieldingStore {
    type Error = std::convert::Infallible;

    async fn has_item(&self, key: &str) -> Result<bool, Self::Error> {
        tokio::task::yield_now().await;
        self.inner.has_item(key).await
    }

    async fn get_item(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        tokio::task::yield_now().await;
        self.inner.get_item(key).await
    }

    async fn set_item(&self, key: &str, value: Vec<u8>) -> Result<bool, Self::Error> {
        tokio::task::yield_now().await;
        self.inner.set_item(key, value).await
    }

    async fn replace_item(&self, key: &str, value: Vec<u8>) -> Result<bool, Self::Error> {
        tokio::task::yield_now().await;
        self.inner.replace_item(key, value).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> Result<bool, Self::Error> {
        tokio::task::yield_now().await;
        self.inner.compare_and_swap(key, expected, value).await
    }
}

/// In-memory store whose reads and writes can be switched to fail.
#[derive(Clone, Debug, Default)]
pub struct FlakyStore {
    pub inner: InMemoryBucketStore,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    refuse_writes: Arc<AtomicBool>,
}

impl FlakyStore {
    /// Reads return `Err`.
    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    /// Writes return `Err`.
    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    /// Writes return `Ok(false)` without storing anything.
    pub fn refuse_writes(&self, on: bool) {
        self.refuse_writes.store(on, Ordering::SeqCst);
    }

    fn read_guard(&self) -> io::Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "cache unreachable"));
        }
        Ok(())
    }

    fn write_guard(&self) -> io::Result<bool> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        Ok(!self.refuse_writes.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl BucketStore for FlakyStore {
    type Error = io::Error;

    async fn has_item(&self, key: &str) -> Result<bool, Self::Error> {
        self.read_guard()?;
        Ok(self.inner.has_item(key).await.unwrap_or_default())
    }

    async fn get_item(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        self.read_guard()?;
        Ok(self.inner.get_item(key).await.unwrap_or_default())
    }

    async fn set_item(&self, key: &str, value: Vec<u8>) -> Result<bool, Self::Error> {
        if !self.write_guard()? {
            return Ok(false);
        }
        Ok(self.inner.set_item(key, value).await.unwrap_or_default())
    }

    async fn replace_item(&self, key: &str, value: Vec<u8>) -> Result<bool, Self::Error> {
        if !self.write_guard()? {
            return Ok(false);
        }
        Ok(self.inner.replace_item(key, value).await.unwrap_or_default())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> Result<bool, Self::Error> {
        if !self.write_guard()? {
            return Ok(false);
        }
        Ok(self.inner.compare_and_swap(key, expected, value).await.unwrap_or_default())
    }
}
