//! In-memory remote store using moka

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use tokio::sync::Mutex;

use crate::domain::{CacheError, RemoteStore};

/// Configuration for the in-memory store
#[derive(Debug, Clone)]
pub struct InMemoryStoreConfig {
    /// Maximum number of entries
    pub max_capacity: u64,
}

impl Default for InMemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_capacity: 100_000,
        }
    }
}

/// Entry stored in moka
#[derive(Debug, Clone)]
struct StoredEntry {
    data: String,
    /// Expiration timestamp (millis since epoch); `None` never expires
    expires_at: Option<u64>,
}

/// A process-local stand-in for the remote store.
///
/// Useful for single-process deployments and tests where a shared Redis
/// is not available. TTLs are honored on read; `incr_by` is atomic only
/// within this process.
#[derive(Debug)]
pub struct InMemoryStore {
    cache: MokaCache<String, StoredEntry>,
    /// Serializes the read-modify-write in `incr_by`.
    counter_lock: Mutex<()>,
}

impl InMemoryStore {
    /// Creates a store with default configuration
    pub fn new() -> Self {
        Self::with_config(InMemoryStoreConfig::default())
    }

    /// Creates a store with the given configuration
    pub fn with_config(config: InMemoryStoreConfig) -> Self {
        Self {
            cache: MokaCache::builder().max_capacity(config.max_capacity).build(),
            counter_lock: Mutex::new(()),
        }
    }

    fn current_time_millis() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn is_expired(entry: &StoredEntry) -> bool {
        match entry.expires_at {
            Some(at) => Self::current_time_millis() > at,
            None => false,
        }
    }

    async fn live_entry(&self, key: &str) -> Option<StoredEntry> {
        match self.cache.get(key).await {
            Some(entry) if Self::is_expired(&entry) => {
                self.cache.remove(key).await;
                None
            }
            other => other,
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.live_entry(key).await.map(|entry| entry.data))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl.map(|ttl| Self::current_time_millis() + ttl.as_millis() as u64);
        let entry = StoredEntry {
            data: value.to_string(),
            expires_at,
        };

        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let existed = self.live_entry(key).await.is_some();
        self.cache.remove(key).await;
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.live_entry(key).await.is_some())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        // Held across the read and the write so concurrent increments
        // never lose updates.
        let _guard = self.counter_lock.lock().await;

        let current: i64 = match self.live_entry(key).await {
            Some(entry) => entry.data.parse().map_err(|_| {
                CacheError::backend(format!("value at '{key}' is not an integer"))
            })?,
            None => 0,
        };

        let new_value = current.saturating_add(delta);
        let entry = StoredEntry {
            data: new_value.to_string(),
            expires_at: None,
        };
        self.cache.insert(key.to_string(), entry).await;

        Ok(new_value)
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        let mut results = Vec::with_capacity(keys.len());

        for key in keys {
            results.push(self.live_entry(key).await.map(|entry| entry.data));
        }

        Ok(results)
    }

    async fn flush_all(&self) -> Result<(), CacheError> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}
