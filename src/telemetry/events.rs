//! Events emitted by the bucket engine.

use std::fmt;

/// Structured event describing one engine decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketEvent {
    /// An increment was admitted and persisted.
    Admitted {
        /// Bucket that was filled.
        namespace: String,
        /// Drops requested.
        count: u64,
        /// Drops held after the fill.
        drops: u64,
    },
    /// An increment would have exceeded the limit.
    Rejected {
        /// Bucket that rejected the increment.
        namespace: String,
        /// Drops requested.
        count: u64,
        /// How far past the limit the increment would have gone.
        overflow: u64,
    },
    /// Elapsed time drained at least one drop.
    Leaked {
        /// Bucket that leaked.
        namespace: String,
        /// Drops removed.
        leaked: u64,
        /// Drops remaining.
        drops: u64,
    },
    /// A conditional write lost to a concurrent writer.
    Contended {
        /// Bucket being written.
        namespace: String,
        /// Attempt that lost (1-indexed).
        attempt: usize,
    },
    /// A write to the store failed.
    PersistFailed {
        /// Bucket being written.
        namespace: String,
    },
}

impl BucketEvent {
    /// Namespace the event concerns.
    pub fn namespace(&self) -> &str {
        match self {
            BucketEvent::Admitted { namespace, .. }
            | BucketEvent::Rejected { namespace, .. }
            | BucketEvent::Leaked { namespace, .. }
            | BucketEvent::Contended { namespace, .. }
            | BucketEvent::PersistFailed { namespace } => namespace,
        }
    }
}

impl fmt::Display for BucketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketEvent::Admitted { namespace, count, drops } => {
                write!(f, "Bucket::Admitted({namespace}, +{count} -> {drops})")
            }
            BucketEvent::Rejected { namespace, count, overflow } => {
                write!(f, "Bucket::Rejected({namespace}, +{count}, overflow={overflow})")
            }
            BucketEvent::Leaked { namespace, leaked, drops } => {
                write!(f, "Bucket::Leaked({namespace}, -{leaked} -> {drops})")
            }
            BucketEvent::Contended { namespace, attempt } => {
                write!(f, "Bucket::Contended({namespace}, attempt #{attempt})")
            }
            BucketEvent::PersistFailed { namespace } => {
                write!(f, "Bucket::PersistFailed({namespace})")
            }
        }
    }
}
