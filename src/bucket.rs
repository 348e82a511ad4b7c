//! Bucket state and the pure leak/fill transitions.
//!
//! A [`Bucket`] is the whole persisted state of one namespace: how many drops it
//! holds and when it was last touched. Leaking is computed from elapsed time at
//! read, so no background timer is needed; sub-drop leakage is rounded to the
//! nearest whole drop, which trades a little accuracy under very frequent access
//! for integer bookkeeping.

use crate::error::RecordError;
use serde::{Deserialize, Serialize};

/// Immutable snapshot of one namespace's bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    drops: u64,
    timestamp: f64,
}

// Wire shape; drops is wider than u64 and signed so the full u64 range
// round-trips and out-of-range values are reported rather than folded into a
// generic parse error.
#[derive(Serialize, Deserialize)]
struct Record {
    drops: i128,
    timestamp: f64,
}

// Clock readings that could not be persisted (negative, NaN, infinite) read as 0.
fn valid_time(now: f64) -> f64 {
    if now.is_finite() {
        now.max(0.0)
    } else {
        0.0
    }
}

impl Bucket {
    /// A fresh bucket holding no drops.
    ///
    /// A negative or non-finite `now` is stamped as `0.0`.
    pub fn empty(now: f64) -> Self {
        Self { drops: 0, timestamp: valid_time(now) }
    }

    /// Build a bucket, rejecting non-finite or negative timestamps.
    pub fn new(drops: u64, timestamp: f64) -> Result<Self, RecordError> {
        if !timestamp.is_finite() || timestamp < 0.0 {
            return Err(RecordError::InvalidTimestamp { timestamp });
        }
        Ok(Self { drops, timestamp })
    }

    /// Current accumulated usage.
    pub fn drops(&self) -> u64 {
        self.drops
    }

    /// Seconds timestamp of the last leak or fill.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Drain the drops accumulated since `timestamp` at `leak_rate` drops/sec.
    ///
    /// A stored timestamp ahead of `now` counts as zero elapsed time and is kept,
    /// so the timestamp never moves backwards.
    pub fn leak(self, now: f64, leak_rate: f64) -> Self {
        let now = valid_time(now);
        let elapsed = (now - self.timestamp).max(0.0);
        // `as` saturates for out-of-range floats
        let leakage = (elapsed * leak_rate).round() as u64;
        Self { drops: self.drops.saturating_sub(leakage), timestamp: now.max(self.timestamp) }
    }

    /// Add `count` drops, saturating at `capacity`.
    pub fn fill(self, count: u64, capacity: u64, now: f64) -> Self {
        let drops = match self.drops.checked_add(count) {
            Some(total) if total < capacity => total,
            _ => capacity,
        };
        Self { drops, timestamp: valid_time(now).max(self.timestamp) }
    }

    /// Clamp drops to `capacity`.
    pub fn clamp(self, capacity: u64) -> Self {
        Self { drops: self.drops.min(capacity), ..self }
    }

    /// Encode as the JSON record stored by the bucket store.
    pub fn encode(&self) -> Vec<u8> {
        let record = Record { drops: i128::from(self.drops), timestamp: self.timestamp };
        // Every constructor keeps the timestamp finite, so serialization cannot fail.
        serde_json::to_vec(&record).unwrap_or_default()
    }

    /// Decode and validate a stored record.
    pub fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        let record: Record = serde_json::from_slice(bytes)?;
        let drops = match u64::try_from(record.drops) {
            Ok(drops) => drops,
            Err(_) if record.drops < 0 => return Err(RecordError::NegativeDrops { drops: record.drops }),
            Err(_) => return Err(RecordError::DropsOutOfRange { drops: record.drops }),
        };
        Self::new(drops, record.timestamp)
    }
}
