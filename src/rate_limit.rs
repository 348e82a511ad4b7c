//! Admission decisions for callers that would rather branch than match on errors.
//!
//! [`RateLimiter::acquire`] folds a capacity rejection into a [`Decision`] so a
//! request-handling layer can turn it straight into `X-RateLimit-Remaining` /
//! `Retry-After` style output. Storage and configuration failures stay errors.

use crate::error::LimiterError;
use crate::limiter::LeakyBucket;
use crate::store::BucketStore;
use crate::telemetry::TelemetrySink;
use std::time::Duration;

/// The decision returned by a rate limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The permits were added to the bucket.
    Allowed {
        /// Drops held after this acquisition.
        usage: u64,
        /// Room left after this acquisition.
        remaining: u64,
    },
    /// The bucket had no room for the permits.
    Denied {
        /// How long until enough drops leak out for the same request to fit.
        ///
        /// Requests larger than the limit never fit; `wait` is then the time to
        /// drain an empty bucket's worth of overflow and retrying will still be denied.
        wait: Duration,
        /// Permits past the limit.
        overflow: u64,
    },
}

impl Decision {
    /// Helper to check if allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// Namespace-keyed admission interface.
#[async_trait::async_trait]
pub trait RateLimiter: Send + Sync {
    /// Attempt to add `permits` drops to `namespace`.
    async fn acquire(&self, namespace: &str, permits: u64) -> Result<Decision, LimiterError>;
}

#[async_trait::async_trait]
impl<S, K> RateLimiter for LeakyBucket<S, K>
where
    S: BucketStore + 'static,
    K: TelemetrySink,
    K::Future: Send + 'static,
{
    async fn acquire(&self, namespace: &str, permits: u64) -> Result<Decision, LimiterError> {
        match self.increment_usage_by(namespace, permits).await {
            Ok(usage) => Ok(Decision::Allowed {
                usage,
                remaining: self.limit(namespace).saturating_sub(usage),
            }),
            Err(LimiterError::CapacityExceeded { overflow, .. }) => {
                let secs = overflow as f64 / self.config().leak_rate();
                Ok(Decision::Denied {
                    wait: Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX),
                    overflow,
                })
            }
            Err(e) => Err(e),
        }
    }
}
