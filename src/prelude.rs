//! Convenient re-exports for common dripfeed types.
pub use crate::{
    clock::{Clock, ManualClock, SystemClock},
    error::{ConfigError, LimiterError},
    limiter::{BucketStatus, Consistency, LeakyBucket, LimiterConfig},
    rate_limit::{Decision, RateLimiter},
    store::{BucketStore, InMemoryBucketStore},
    telemetry::{BucketEvent, LogSink, MemorySink, NullSink, TelemetrySink},
};
