//! Infrastructure layer - Remote store implementations

pub mod logging;
pub mod memory;
pub mod redis;

pub use memory::{InMemoryStore, InMemoryStoreConfig};
pub use redis::{RedisStore, RedisStoreConfig};
