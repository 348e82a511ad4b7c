#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # dripfeed
//!
//! Store-backed leaky-bucket rate limiting for admission control.
//!
//! Each namespace (a client id, an IP, an account) owns a bucket of drops.
//! Admitting work adds drops; drops leak out at a fixed rate; work that would
//! overflow the bucket's capacity is rejected. Capacity bounds the burst, the
//! leak rate bounds sustained throughput.
//!
//! ## Features
//!
//! - **Time-proportional leaking** computed at read, no background timers
//! - **Pluggable storage** through the [`BucketStore`] port, one record per namespace
//! - **Optimistic concurrency** via `compare_and_swap`, or last-write-wins
//! - **Injectable clock** for deterministic tests
//! - **Structured telemetry** through tower-based sinks and `tracing`
//!
//! ## Quick Start
//!
//! ```rust
//! use dripfeed::{InMemoryBucketStore, LeakyBucket, LimiterConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     // 60 drops of burst, draining one per second
//!     let config = LimiterConfig::new(60, 1.0).unwrap();
//!     let limiter = LeakyBucket::with_store(config, InMemoryBucketStore::new());
//!
//!     match limiter.increment_usage("203.0.113.9").await {
//!         Ok(usage) => println!("admitted, usage now {usage}"),
//!         Err(e) if e.is_capacity_exceeded() => {
//!             let wait = limiter.estimate("203.0.113.9").await.unwrap();
//!             println!("rejected, retry in {wait}ms");
//!         }
//!         Err(e) => eprintln!("limiter unavailable: {e}"),
//!     }
//! }
//! ```

pub mod bucket;
pub mod clock;
pub mod error;
pub mod limiter;
pub mod prelude;
pub mod rate_limit;
pub mod store;
pub mod telemetry;

// Re-exports
pub use bucket::Bucket;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, LimiterError, RecordError};
pub use limiter::{BucketStatus, Consistency, LeakyBucket, LimiterConfig};
pub use rate_limit::{Decision, RateLimiter};
pub use store::{BucketStore, InMemoryBucketStore};
