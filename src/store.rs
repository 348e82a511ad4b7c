//! Storage port for bucket records.
//!
//! The engine keeps no state of its own; every bucket lives in a [`BucketStore`]
//! as one opaque record per namespace. Backends may be in-memory, file-based or
//! a remote cache. Expiry and eviction are backend policy.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Abstract key/value storage for bucket records.
///
/// `compare_and_swap` must be atomic with respect to every other write on the same
/// key; it is what lets several engines share one backend without admitting past
/// capacity. Engines configured for
/// [`Consistency::LastWriteWins`](crate::limiter::Consistency::LastWriteWins)
/// only use the unconditional writes.
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Whether a record exists for `key`. No side effects.
    async fn has_item(&self, key: &str) -> Result<bool, Self::Error>;

    /// Fetch the record for `key`, `None` if absent.
    async fn get_item(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Create the record for `key`. Returns the backend's success flag.
    async fn set_item(&self, key: &str, value: Vec<u8>) -> Result<bool, Self::Error>;

    /// Overwrite an existing record. Returns `false` if nothing was replaced.
    async fn replace_item(&self, key: &str, value: Vec<u8>) -> Result<bool, Self::Error>;

    /// Write `value` only if the current record equals `expected`.
    ///
    /// `expected = None` means "only if absent". Returns `Ok(false)` when the
    /// record changed since it was read (retry needed).
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> Result<bool, Self::Error>;
}

#[async_trait]
impl<S> BucketStore for Arc<S>
where
    S: BucketStore + ?Sized,
{
    type Error = S::Error;

    async fn has_item(&self, key: &str) -> Result<bool, Self::Error> {
        (**self).has_item(key).await
    }

    async fn get_item(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        (**self).get_item(key).await
    }

    async fn set_item(&self, key: &str, value: Vec<u8>) -> Result<bool, Self::Error> {
        (**self).set_item(key, value).await
    }

    async fn replace_item(&self, key: &str, value: Vec<u8>) -> Result<bool, Self::Error> {
        (**self).replace_item(key, value).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> Result<bool, Self::Error> {
        (**self).compare_and_swap(key, expected, value).await
    }
}

/// Simple in-memory bucket store.
///
/// Clones share the same map.
#[derive(Default, Clone, Debug)]
pub struct InMemoryBucketStore {
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop the record for `key`, returning it.
    pub fn remove(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().remove(key)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        // Map writes are single inserts; a panicking holder cannot leave it half-updated.
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BucketStore for InMemoryBucketStore {
    type Error = std::convert::Infallible;

    async fn has_item(&self, key: &str) -> Result<bool, Self::Error> {
        Ok(self.lock().contains_key(key))
    }

    async fn get_item(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: Vec<u8>) -> Result<bool, Self::Error> {
        self.lock().insert(key.to_string(), value);
        Ok(true)
    }

    async fn replace_item(&self, key: &str, value: Vec<u8>) -> Result<bool, Self::Error> {
        let mut guard = self.lock();
        match guard.get_mut(key) {
            Some(slot) => {
                *slot = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> Result<bool, Self::Error> {
        let mut guard = self.lock();
        if guard.get(key).map(Vec::as_slice) != expected {
            return Ok(false); // Race detected
        }
        guard.insert(key.to_string(), value);
        Ok(true)
    }
}
