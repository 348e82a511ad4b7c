//! Clock abstractions used by the leak algorithm.
//!
//! Bucket timestamps are persisted alongside the drop count, so the time source
//! has to mean the same thing across process restarts: [`SystemClock`] reads
//! wall-clock seconds since the UNIX epoch. [`ManualClock`] lets tests move time
//! forward explicitly instead of sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Clock abstraction so elapsed time can be faked in tests.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time in seconds, with sub-second precision.
    fn now_secs(&self) -> f64;
}

/// Wall clock backed by `SystemTime::now()`.
///
/// A system clock set before the epoch reads as `0.0`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> f64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
    }
}

/// Manually driven clock. Clones share the same instant.
///
/// # Example
/// ```
/// use dripfeed::clock::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new(100.0);
/// let handle = clock.clone();
/// handle.advance(Duration::from_millis(1500));
/// assert_eq!(clock.now_secs(), 101.5);
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    // f64 bit pattern
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    /// Start the clock at `start_secs`.
    pub fn new(start_secs: f64) -> Self {
        Self { bits: Arc::new(AtomicU64::new(start_secs.to_bits())) }
    }

    /// Move time forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.advance_secs(by.as_secs_f64());
    }

    /// Move time forward by a fractional number of seconds.
    pub fn advance_secs(&self, secs: f64) {
        // fetch_update never fails when the closure always returns Some
        let _ = self.bits.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| {
            Some((f64::from_bits(cur) + secs).to_bits())
        });
    }

    /// Jump to an absolute instant, possibly backwards.
    pub fn set_secs(&self, secs: f64) {
        self.bits.store(secs.to_bits(), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}
