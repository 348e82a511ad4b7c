//! Error types for the leaky-bucket engine

/// Boxed error from a storage backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced when validating limiter configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Capacity must be > 0.
    #[error("capacity must be > 0 (got {provided})")]
    InvalidCapacity {
        /// Value provided by caller.
        provided: u64,
    },
    /// Leak rate must be finite and > 0.
    #[error("leak_rate must be a finite number > 0 (got {provided})")]
    InvalidLeakRate {
        /// Value provided by caller.
        provided: f64,
    },
    /// Optimistic consistency needs at least one attempt.
    #[error("max_attempts must be > 0 (got {provided})")]
    InvalidMaxAttempts {
        /// Value provided by caller.
        provided: usize,
    },
}

/// A stored bucket record that failed to decode or validate.
#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    /// Not a JSON bucket record.
    #[error("malformed bucket record: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Drop counts are never negative.
    #[error("bucket record has negative drops ({drops})")]
    NegativeDrops {
        /// Value found in the record.
        drops: i128,
    },
    /// Drop counts must fit in a `u64`.
    #[error("bucket record drops out of range ({drops})")]
    DropsOutOfRange {
        /// Value found in the record.
        drops: i128,
    },
    /// Timestamps must be finite, non-negative seconds.
    #[error("bucket record has invalid timestamp ({timestamp})")]
    InvalidTimestamp {
        /// Value found in the record.
        timestamp: f64,
    },
}

/// Errors surfaced by [`LeakyBucket`](crate::LeakyBucket) operations.
#[derive(thiserror::Error, Debug)]
pub enum LimiterError {
    /// No store has been bound to the engine yet.
    #[error("no bucket store configured")]
    StorageNotConfigured,
    /// The increment would push usage past the limit. Bucket state is untouched.
    #[error("capacity exceeded for '{namespace}' by {overflow} (limit {limit})")]
    CapacityExceeded {
        /// Bucket that rejected the increment.
        namespace: String,
        /// How far past the limit the increment would have gone.
        overflow: u64,
        /// Configured limit.
        limit: u64,
    },
    /// Writing the leaked or filled bucket back to the store failed.
    ///
    /// `source` is `None` when the store reported failure through its success flag.
    #[error("failed to persist bucket '{namespace}'")]
    BucketPersistence {
        /// Bucket being written.
        namespace: String,
        /// Backend error, if any.
        #[source]
        source: Option<BoxError>,
    },
    /// Reading the bucket from the store failed.
    #[error("failed to read bucket '{namespace}'")]
    StorageRead {
        /// Bucket being read.
        namespace: String,
        /// Backend error.
        #[source]
        source: BoxError,
    },
    /// The stored record could not be decoded.
    #[error("corrupt bucket record for '{namespace}'")]
    CorruptRecord {
        /// Bucket being read.
        namespace: String,
        /// Decode failure.
        #[source]
        source: RecordError,
    },
    /// Conditional writes kept losing to concurrent writers.
    #[error("bucket '{namespace}' contended; gave up after {attempts} attempts")]
    Contended {
        /// Bucket being written.
        namespace: String,
        /// Attempts made.
        attempts: usize,
    },
}

impl LimiterError {
    /// Check if this error is a capacity rejection.
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }

    /// Check if this error is due to a missing store.
    pub fn is_storage_not_configured(&self) -> bool {
        matches!(self, Self::StorageNotConfigured)
    }

    /// Check if this error is a failed write.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::BucketPersistence { .. })
    }

    /// Check if this error is due to write contention.
    pub fn is_contended(&self) -> bool {
        matches!(self, Self::Contended { .. })
    }

    /// Overflow amount for capacity rejections.
    pub fn overflow(&self) -> Option<u64> {
        match self {
            Self::CapacityExceeded { overflow, .. } => Some(*overflow),
            _ => None,
        }
    }

    /// Namespace the failing call was made for, if any.
    pub fn namespace(&self) -> Option<&str> {
        match self {
            Self::StorageNotConfigured => None,
            Self::CapacityExceeded { namespace, .. }
            | Self::BucketPersistence { namespace, .. }
            | Self::StorageRead { namespace, .. }
            | Self::CorruptRecord { namespace, .. }
            | Self::Contended { namespace, .. } => Some(namespace),
        }
    }
}
