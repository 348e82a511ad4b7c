//! The leaky-bucket engine.
//!
//! [`LeakyBucket`] owns the leak/fill/limit algorithm and nothing else: every
//! bucket lives in a [`BucketStore`], keyed by namespace. Each call loads the
//! bucket, leaks it by the time elapsed since it was last touched, persists the
//! leaked state, and then (for increments) fills and persists again.
//!
//! The load/leak/fill/save sequence is a read-modify-write against the store.
//! With [`Consistency::Optimistic`] (the default) every write is a
//! `compare_and_swap` against the bytes that were read, and a lost race restarts
//! the call. [`Consistency::LastWriteWins`] uses plain writes and can admit past
//! capacity when callers race on one namespace.

use crate::bucket::Bucket;
use crate::clock::{Clock, SystemClock};
use crate::error::{BoxError, ConfigError, LimiterError};
use crate::store::BucketStore;
use crate::telemetry::{emit_best_effort, BucketEvent, NullSink, TelemetrySink};
use arc_swap::ArcSwapOption;
use std::fmt;
use std::sync::Arc;

/// Attempts made by [`Consistency::Optimistic`] unless configured otherwise.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// How writes to the store are guarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    /// Conditional writes; retry the whole call up to `max_attempts` times on a lost race.
    Optimistic {
        /// Total attempts before failing with [`LimiterError::Contended`].
        max_attempts: usize,
    },
    /// Unconditional `set_item`/`replace_item`. Concurrent increments may over-admit.
    LastWriteWins,
}

impl Consistency {
    fn attempts(self) -> usize {
        match self {
            Consistency::Optimistic { max_attempts } => max_attempts,
            Consistency::LastWriteWins => 1,
        }
    }
}

impl Default for Consistency {
    fn default() -> Self {
        Consistency::Optimistic { max_attempts: DEFAULT_MAX_ATTEMPTS }
    }
}

/// Validated limiter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LimiterConfig {
    capacity: u64,
    leak_rate: f64,
    consistency: Consistency,
}

impl LimiterConfig {
    /// Create a config with validation.
    ///
    /// `capacity` is the burst ceiling in drops; `leak_rate` is drops drained per second.
    ///
    /// # Examples
    /// ```
    /// use dripfeed::LimiterConfig;
    /// let config = LimiterConfig::new(60, 1.0).unwrap();
    /// assert_eq!(config.capacity(), 60);
    /// assert!(LimiterConfig::new(0, 1.0).is_err());
    /// ```
    pub fn new(capacity: u64, leak_rate: f64) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::InvalidCapacity { provided: capacity });
        }
        if !leak_rate.is_finite() || leak_rate <= 0.0 {
            return Err(ConfigError::InvalidLeakRate { provided: leak_rate });
        }
        Ok(Self { capacity, leak_rate, consistency: Consistency::default() })
    }

    /// Override the write guard; optimistic mode needs at least one attempt.
    pub fn with_consistency(mut self, consistency: Consistency) -> Result<Self, ConfigError> {
        if let Consistency::Optimistic { max_attempts: 0 } = consistency {
            return Err(ConfigError::InvalidMaxAttempts { provided: 0 });
        }
        self.consistency = consistency;
        Ok(self)
    }

    /// Maximum drops a bucket may hold.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Drops drained per second.
    pub fn leak_rate(&self) -> f64 {
        self.leak_rate
    }

    /// Write guard in use.
    pub fn consistency(&self) -> Consistency {
        self.consistency
    }
}

/// Every derived metric for one namespace, computed from a single load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketStatus {
    /// Drops currently held.
    pub usage: u64,
    /// Configured limit.
    pub limit: u64,
    /// `limit - usage`.
    pub remaining: u64,
    /// Milliseconds until the bucket drains to empty.
    pub reset_ms: u64,
    /// Milliseconds until one drop frees up, `0` while room remains.
    pub retry_after_ms: u64,
}

enum Attempt<T> {
    Done(T),
    Raced,
}

struct Loaded {
    bucket: Bucket,
    // bytes now in the store, `None` if the namespace has no record yet
    raw: Option<Vec<u8>>,
}

/// Leaky-bucket rate limiter over a pluggable [`BucketStore`].
///
/// The engine is stateless apart from its immutable configuration, so one
/// instance can be shared (e.g. behind an `Arc`) by any number of tasks.
///
/// # Example
/// ```
/// use dripfeed::{InMemoryBucketStore, LeakyBucket, LimiterConfig};
/// use dripfeed::clock::ManualClock;
///
/// # #[tokio::main]
/// # async fn main() {
/// let clock = ManualClock::new(0.0);
/// let limiter = LeakyBucket::with_store(LimiterConfig::new(10, 1.0).unwrap(), InMemoryBucketStore::new())
///     .with_clock(clock.clone());
///
/// assert_eq!(limiter.increment_usage_by("10.0.0.1", 10).await.unwrap(), 10);
/// assert!(limiter.increment_usage("10.0.0.1").await.unwrap_err().is_capacity_exceeded());
///
/// clock.advance_secs(5.0);
/// assert_eq!(limiter.usage("10.0.0.1").await.unwrap(), 5);
/// # }
/// ```
pub struct LeakyBucket<S, K = NullSink> {
    config: LimiterConfig,
    store: ArcSwapOption<S>,
    clock: Arc<dyn Clock>,
    sink: K,
}

impl<S, K> fmt::Debug for LeakyBucket<S, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeakyBucket")
            .field("config", &self.config)
            .field("store_bound", &self.store.load().is_some())
            .field("clock", &self.clock)
            .finish()
    }
}

impl<S> LeakyBucket<S, NullSink> {
    /// Create an engine with no store bound; bind one with [`set_store`](Self::set_store).
    pub fn new(config: LimiterConfig) -> Self {
        Self {
            config,
            store: ArcSwapOption::empty(),
            clock: Arc::new(SystemClock),
            sink: NullSink,
        }
    }

    /// Create an engine backed by `store`.
    pub fn with_store(config: LimiterConfig, store: S) -> Self {
        let limiter = Self::new(config);
        limiter.set_store(store);
        limiter
    }
}

impl<S, K> LeakyBucket<S, K> {
    /// Bind (or rebind) the store.
    pub fn set_store(&self, store: S) {
        self.store.store(Some(Arc::new(store)));
    }

    /// Whether a store is bound.
    pub fn has_store(&self) -> bool {
        self.store.load().is_some()
    }

    /// Override the clock (useful for deterministic tests).
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Route events to `sink`.
    pub fn with_sink<K2>(self, sink: K2) -> LeakyBucket<S, K2> {
        LeakyBucket { config: self.config, store: self.store, clock: self.clock, sink }
    }

    /// Configuration in use.
    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Limit for `namespace`. Every namespace shares the configured capacity.
    pub fn limit(&self, _namespace: &str) -> u64 {
        self.config.capacity
    }

    /// Leak rate scaled by `factor`, rounded up.
    ///
    /// `factor` converts from per-second to the caller's unit, e.g. `60.0` for
    /// drops per minute. Ignores bucket state.
    pub fn ratio(&self, _namespace: &str, factor: f64) -> u64 {
        // `as` saturates; negative or NaN factors give 0
        (self.config.leak_rate * factor).ceil() as u64
    }

    fn retry_after_ms(&self) -> u64 {
        (1000.0 / self.config.leak_rate).ceil() as u64
    }

    fn reset_ms(&self, drops: u64) -> u64 {
        if drops == 0 {
            return 0;
        }
        let secs = (drops as f64 / self.config.leak_rate).ceil() as u64;
        secs.saturating_mul(1000)
    }
}

impl<S, K> LeakyBucket<S, K>
where
    S: BucketStore + 'static,
    K: TelemetrySink,
    K::Future: Send + 'static,
{
    /// Add one drop to `namespace`. See [`increment_usage_by`](Self::increment_usage_by).
    pub async fn increment_usage(&self, namespace: &str) -> Result<u64, LimiterError> {
        self.increment_usage_by(namespace, 1).await
    }

    /// Add `count` drops to `namespace`, returning the drops now held.
    ///
    /// # Errors
    /// - [`LimiterError::CapacityExceeded`] if `usage + count` would pass the limit;
    ///   the bucket is left as leaked, with nothing added.
    /// - [`LimiterError::StorageNotConfigured`] if no store is bound.
    /// - [`LimiterError::BucketPersistence`] if a write fails.
    /// - [`LimiterError::Contended`] if every optimistic attempt lost a race.
    pub async fn increment_usage_by(&self, namespace: &str, count: u64) -> Result<u64, LimiterError> {
        let store = self.bound_store()?;
        for attempt in 1..=self.config.consistency.attempts() {
            match self.try_increment(&store, namespace, count).await? {
                Attempt::Done(drops) => return Ok(drops),
                Attempt::Raced => self.on_contended(namespace, attempt).await,
            }
        }
        Err(self.contended(namespace))
    }

    /// Drops currently held by `namespace`.
    ///
    /// Applies and persists pending leakage, so a pure read still moves the bucket
    /// forward in time.
    pub async fn usage(&self, namespace: &str) -> Result<u64, LimiterError> {
        Ok(self.load(namespace).await?.drops())
    }

    /// Whether `namespace` has room for at least one more drop.
    pub async fn has_limit(&self, namespace: &str) -> Result<bool, LimiterError> {
        Ok(self.remaining(namespace).await? > 0)
    }

    /// Room left in `namespace`. Never negative.
    pub async fn remaining(&self, namespace: &str) -> Result<u64, LimiterError> {
        let usage = self.usage(namespace).await?;
        Ok(self.limit(namespace).saturating_sub(usage))
    }

    /// Milliseconds until one drop leaks out of a full bucket, `0` while room remains.
    pub async fn estimate(&self, namespace: &str) -> Result<u64, LimiterError> {
        if self.remaining(namespace).await? == 0 {
            Ok(self.retry_after_ms())
        } else {
            Ok(0)
        }
    }

    /// Milliseconds until `namespace` drains to empty, in whole seconds.
    pub async fn reset(&self, namespace: &str) -> Result<u64, LimiterError> {
        let bucket = self.load(namespace).await?;
        Ok(self.reset_ms(bucket.drops()))
    }

    /// All derived metrics for `namespace` from one load.
    pub async fn status(&self, namespace: &str) -> Result<BucketStatus, LimiterError> {
        let usage = self.load(namespace).await?.drops();
        let limit = self.limit(namespace);
        let remaining = limit.saturating_sub(usage);
        Ok(BucketStatus {
            usage,
            limit,
            remaining,
            reset_ms: self.reset_ms(usage),
            retry_after_ms: if remaining == 0 { self.retry_after_ms() } else { 0 },
        })
    }

    fn bound_store(&self) -> Result<Arc<S>, LimiterError> {
        self.store.load_full().ok_or(LimiterError::StorageNotConfigured)
    }

    fn contended(&self, namespace: &str) -> LimiterError {
        let attempts = self.config.consistency.attempts();
        tracing::warn!(namespace, attempts, "bucket write contention; giving up");
        LimiterError::Contended { namespace: namespace.to_string(), attempts }
    }

    async fn on_contended(&self, namespace: &str, attempt: usize) {
        tracing::debug!(namespace, attempt, "bucket changed under us; retrying");
        self.emit(BucketEvent::Contended { namespace: namespace.to_string(), attempt }).await;
    }

    async fn emit(&self, event: BucketEvent) {
        emit_best_effort(self.sink.clone(), event).await;
    }

    async fn load(&self, namespace: &str) -> Result<Bucket, LimiterError> {
        let store = self.bound_store()?;
        for attempt in 1..=self.config.consistency.attempts() {
            let now = self.clock.now_secs();
            match self.try_load(&store, namespace, now).await? {
                Attempt::Done(loaded) => return Ok(loaded.bucket),
                Attempt::Raced => self.on_contended(namespace, attempt).await,
            }
        }
        Err(self.contended(namespace))
    }

    async fn try_increment(
        &self,
        store: &S,
        namespace: &str,
        count: u64,
    ) -> Result<Attempt<u64>, LimiterError> {
        let now = self.clock.now_secs();
        let loaded = match self.try_load(store, namespace, now).await? {
            Attempt::Done(loaded) => loaded,
            Attempt::Raced => return Ok(Attempt::Raced),
        };

        let limit = self.limit(namespace);
        let wanted = u128::from(loaded.bucket.drops()) + u128::from(count);
        if wanted > u128::from(limit) {
            let overflow = u64::try_from(wanted - u128::from(limit)).unwrap_or(u64::MAX);
            tracing::warn!(namespace, drops = loaded.bucket.drops(), count, overflow, "bucket capacity exceeded");
            self.emit(BucketEvent::Rejected { namespace: namespace.to_string(), count, overflow }).await;
            return Err(LimiterError::CapacityExceeded {
                namespace: namespace.to_string(),
                overflow,
                limit,
            });
        }

        let filled = loaded.bucket.fill(count, self.config.capacity, now);
        if !self.write(store, namespace, loaded.raw.as_deref(), filled.encode()).await? {
            return Ok(Attempt::Raced);
        }
        tracing::debug!(namespace, count, drops = filled.drops(), "bucket filled");
        self.emit(BucketEvent::Admitted { namespace: namespace.to_string(), count, drops: filled.drops() })
            .await;
        Ok(Attempt::Done(filled.drops()))
    }

    async fn try_load(
        &self,
        store: &S,
        namespace: &str,
        now: f64,
    ) -> Result<Attempt<Loaded>, LimiterError> {
        let read_err = |e: S::Error| LimiterError::StorageRead {
            namespace: namespace.to_string(),
            source: Box::new(e),
        };

        let raw = if store.has_item(namespace).await.map_err(read_err)? {
            store.get_item(namespace).await.map_err(read_err)?
        } else {
            None
        };
        let Some(raw) = raw else {
            return Ok(Attempt::Done(Loaded { bucket: Bucket::empty(now), raw: None }));
        };

        let stored = Bucket::decode(&raw).map_err(|source| LimiterError::CorruptRecord {
            namespace: namespace.to_string(),
            source,
        })?;
        let leaked_bucket = stored.leak(now, self.config.leak_rate);
        let leaked = stored.drops() - leaked_bucket.drops();
        // a record written by an engine with a larger capacity is clamped here
        let bucket = leaked_bucket.clamp(self.config.capacity);
        if leaked > 0 {
            tracing::debug!(namespace, leaked, drops = bucket.drops(), "bucket leaked");
            self.emit(BucketEvent::Leaked { namespace: namespace.to_string(), leaked, drops: bucket.drops() })
                .await;
        }

        let encoded = bucket.encode();
        if !self.write(store, namespace, Some(&raw), encoded.clone()).await? {
            return Ok(Attempt::Raced);
        }
        Ok(Attempt::Done(Loaded { bucket, raw: Some(encoded) }))
    }

    /// `Ok(false)` means a conditional write lost a race.
    async fn write(
        &self,
        store: &S,
        namespace: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> Result<bool, LimiterError> {
        let failure = match self.config.consistency {
            Consistency::Optimistic { .. } => {
                match store.compare_and_swap(namespace, expected, value).await {
                    Ok(swapped) => return Ok(swapped),
                    Err(e) => Some(e),
                }
            }
            Consistency::LastWriteWins => {
                let written = if expected.is_some() {
                    store.replace_item(namespace, value).await
                } else {
                    store.set_item(namespace, value).await
                };
                match written {
                    Ok(true) => return Ok(true),
                    Ok(false) => None,
                    Err(e) => Some(e),
                }
            }
        };

        let detail = match &failure {
            Some(e) => e.to_string(),
            None => "store reported failure".to_string(),
        };
        tracing::warn!(namespace, error = %detail, "failed to persist bucket");
        self.emit(BucketEvent::PersistFailed { namespace: namespace.to_string() }).await;
        Err(LimiterError::BucketPersistence {
            namespace: namespace.to_string(),
            source: failure.map(|e| Box::new(e) as BoxError),
        })
    }
}
