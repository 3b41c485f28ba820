//! Domain layer - cache semantics independent of any backend

pub mod entry;
pub mod error;
pub mod group;
pub mod host;
pub mod key;
pub mod store;

pub use entry::CacheEntry;
pub use error::CacheError;
pub use group::{GroupRegistry, DEFAULT_GROUP};
pub use host::{HostContext, StaticHost};
pub use key::{build_key, TenantContext};
pub use store::RemoteStore;

#[cfg(test)]
pub use store::mock::MockStore;
