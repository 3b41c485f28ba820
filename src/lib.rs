//! tiercache
//!
//! A two-tier object cache: a request-scoped local tier over a shared
//! remote key-value store. Features:
//! - Group-based key namespacing with tenant scoping
//! - Negative-result caching (confirmed misses cost no second round trip)
//! - Batched multi-key fetch (N lookups, at most one round trip)
//! - Local-only groups that never touch the remote store
//! - Redis and in-memory store backends

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod manager;

pub use config::CacheConfig;
pub use domain::{
    CacheEntry, CacheError, GroupRegistry, HostContext, RemoteStore, StaticHost, TenantContext,
    DEFAULT_GROUP,
};
pub use infrastructure::{InMemoryStore, RedisStore, RedisStoreConfig};
pub use manager::CacheManager;
