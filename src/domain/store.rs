//! Remote store trait definition

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::CacheError;

/// The persistent key-value backend shared across processes.
///
/// Values cross this boundary as JSON strings so the trait stays
/// dyn-compatible; typed encoding and decoding live on the manager.
/// Atomicity of `incr_by` and the batching of `get_many` are the store's
/// responsibility, as are timeouts and reconnection. This layer never
/// retries a failed call.
#[async_trait]
pub trait RemoteStore: Send + Sync + Debug {
    /// Fetches a value; `None` means the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores a value. `None` ttl means no expiration.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Removes a key, reporting whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Checks presence without fetching the value.
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Atomically adds `delta` to a numeric value, returning the result.
    /// Missing keys start at zero.
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, CacheError>;

    /// Fetches many keys in one round trip. The output has one slot per
    /// requested key, in order, with `None` for absent keys.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError>;

    /// Drops everything in the logical database. Not scoped to a tenant.
    async fn flush_all(&self) -> Result<(), CacheError>;
}
