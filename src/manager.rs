//! Cache manager - the two-tier read/write paths

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::domain::{
    build_key, CacheEntry, CacheError, GroupRegistry, HostContext, RemoteStore, TenantContext,
};

/// Two-tier object cache for one request's control flow.
///
/// The local tier memoizes remote lookups, including confirmed misses, for
/// the lifetime of this instance. The remote tier is the shared
/// [`RemoteStore`]; persistence, eviction and cross-process atomicity are
/// delegated to it entirely. One instance serves one sequential request,
/// so there is no internal locking; only the store may be shared.
///
/// Values are kept locally as their JSON encoding. Typed reads deserialize
/// a fresh copy on every call, so callers can never mutate cached state
/// through a returned value.
#[derive(Debug)]
pub struct CacheManager {
    store: Arc<dyn RemoteStore>,
    host: Arc<dyn HostContext>,
    local: HashMap<String, CacheEntry>,
    registry: GroupRegistry,
    tenant: TenantContext,
}

impl CacheManager {
    /// Creates a manager bound to a store and a host.
    ///
    /// The tenant id and multi-tenancy mode are read from the host once,
    /// here; later tenant changes go through [`switch_tenant`].
    ///
    /// [`switch_tenant`]: CacheManager::switch_tenant
    pub fn new(store: Arc<dyn RemoteStore>, host: Arc<dyn HostContext>) -> Self {
        let tenant = TenantContext::new(host.current_tenant(), host.multi_tenant());

        Self {
            store,
            host,
            local: HashMap::new(),
            registry: GroupRegistry::new(),
            tenant,
        }
    }

    /// Replaces the default group registry, for hosts with their own group
    /// taxonomy.
    pub fn with_registry(mut self, registry: GroupRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn tenant_id(&self) -> &str {
        self.tenant.tenant_id()
    }

    fn fq_key(&self, key: &str, group: &str) -> String {
        build_key(key, group, &self.tenant, &self.registry)
    }

    /// Reads a value as its raw JSON encoding.
    ///
    /// Without `force`, a local entry answers immediately, including a
    /// cached miss, which returns `None` without a remote call. Otherwise
    /// persistent groups fall through to the store and the result, present
    /// or absent, is memoized locally. Non-persistent groups never reach
    /// the store; an unknown key there is simply `None`.
    pub async fn get_raw(
        &mut self,
        key: &str,
        group: &str,
        force: bool,
    ) -> Result<Option<String>, CacheError> {
        let fq = self.fq_key(key, group);

        if !force {
            if let Some(entry) = self.local.get(&fq) {
                return Ok(entry.as_hit().map(str::to_string));
            }
        }

        if !self.registry.is_persistent(group) {
            return Ok(None);
        }

        let value = self.store.get(&fq).await?;
        self.local.insert(fq, CacheEntry::from(value.clone()));

        Ok(value)
    }

    /// Typed read. `Ok(None)` means not found; a cached miss counts as
    /// not found without costing a round trip.
    pub async fn get<V>(&mut self, key: &str, group: &str, force: bool) -> Result<Option<V>, CacheError>
    where
        V: DeserializeOwned,
    {
        match self.get_raw(key, group, force).await? {
            Some(json) => {
                let value = serde_json::from_str(&json).map_err(|e| {
                    CacheError::serialization(format!(
                        "failed to decode cached value for '{key}' in '{group}': {e}"
                    ))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Writes through: the local tier is always updated, overwriting any
    /// prior entry including a cached miss; persistent groups also write
    /// to the store. A `None` ttl stores without expiration. Remote write
    /// failures are surfaced as errors.
    pub async fn set_raw(
        &mut self,
        key: &str,
        value: &str,
        group: &str,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let fq = self.fq_key(key, group);
        self.local.insert(fq.clone(), CacheEntry::Hit(value.to_string()));

        if self.registry.is_persistent(group) {
            self.store.set(&fq, value, ttl).await?;
        }

        Ok(())
    }

    /// Typed write-through.
    pub async fn set<V>(
        &mut self,
        key: &str,
        value: &V,
        group: &str,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError>
    where
        V: Serialize,
    {
        let json = serde_json::to_string(value).map_err(|e| {
            CacheError::serialization(format!(
                "failed to encode value for '{key}' in '{group}': {e}"
            ))
        })?;
        self.set_raw(key, &json, group, ttl).await
    }

    /// Creates the entry only if no live local entry exists and the host
    /// has not suspended additions. Returns whether the write happened.
    pub async fn add<V>(
        &mut self,
        key: &str,
        value: &V,
        group: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError>
    where
        V: Serialize,
    {
        if self.host.additions_suspended() {
            return Ok(false);
        }

        let fq = self.fq_key(key, group);
        if matches!(self.local.get(&fq), Some(CacheEntry::Hit(_))) {
            return Ok(false);
        }

        self.set(key, value, group, ttl).await?;
        Ok(true)
    }

    /// Updates the entry only if it already exists. Existence is checked
    /// against the store for persistent groups; a fresh process has an
    /// empty local tier even when the remote value is there. Non-persistent
    /// groups check the local tier, their only home.
    pub async fn replace<V>(
        &mut self,
        key: &str,
        value: &V,
        group: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError>
    where
        V: Serialize,
    {
        let fq = self.fq_key(key, group);

        let exists = if self.registry.is_persistent(group) {
            self.store.exists(&fq).await?
        } else {
            matches!(self.local.get(&fq), Some(CacheEntry::Hit(_)))
        };

        if !exists {
            return Ok(false);
        }

        self.set(key, value, group, ttl).await?;
        Ok(true)
    }

    /// Drops the entry locally and, for persistent groups, remotely.
    /// Returns the remote verdict for persistent groups, `true` otherwise.
    pub async fn delete(&mut self, key: &str, group: &str) -> Result<bool, CacheError> {
        let fq = self.fq_key(key, group);
        self.local.remove(&fq);

        if !self.registry.is_persistent(group) {
            return Ok(true);
        }

        self.store.delete(&fq).await
    }

    /// Adds a signed offset to a counter and returns the new value.
    ///
    /// Persistent groups delegate to the store's atomic increment, one
    /// round trip, and mirror the result locally. Non-persistent groups do
    /// the arithmetic locally, treating unknown keys and cached misses as
    /// zero; the local mirror is never atomic across processes.
    pub async fn incr(&mut self, key: &str, offset: i64, group: &str) -> Result<i64, CacheError> {
        let fq = self.fq_key(key, group);

        if !self.registry.is_persistent(group) {
            let current = self.local.get(&fq).map_or(0, CacheEntry::as_counter);
            let next = current.saturating_add(offset);
            self.local.insert(fq, CacheEntry::Hit(next.to_string()));
            return Ok(next);
        }

        let value = self.store.incr_by(&fq, offset).await?;
        self.local.insert(fq, CacheEntry::Hit(value.to_string()));

        Ok(value)
    }

    /// Increment with the offset negated.
    pub async fn decr(&mut self, key: &str, offset: i64, group: &str) -> Result<i64, CacheError> {
        self.incr(key, offset.saturating_neg(), group).await
    }

    /// Batched read across groups.
    ///
    /// Locally known keys, hits and cached misses alike, are answered from
    /// the local tier; everything else for persistent groups goes into a
    /// single `get_many` round trip. Non-persistent groups take the
    /// single-key read path, which stays local anyway. Every requested key
    /// appears in the output, absent ones as `None`, and batch results are
    /// memoized locally with the same miss semantics as [`get_raw`].
    ///
    /// [`get_raw`]: CacheManager::get_raw
    pub async fn get_multi(
        &mut self,
        requests: &[(&str, Vec<&str>)],
    ) -> Result<HashMap<String, HashMap<String, Option<Value>>>, CacheError> {
        let mut out: HashMap<String, HashMap<String, Option<Value>>> = HashMap::new();
        let mut batch: Vec<String> = Vec::new();
        let mut origin: HashMap<String, (String, String)> = HashMap::new();

        for (group, keys) in requests {
            if !self.registry.is_persistent(group) {
                for key in keys {
                    let value = self.get_raw(key, group, false).await?;
                    out.entry(group.to_string())
                        .or_default()
                        .insert(key.to_string(), decode_opt(key, group, value)?);
                }
                continue;
            }

            for key in keys {
                let fq = self.fq_key(key, group);
                let slot = out.entry(group.to_string()).or_default();

                if let Some(entry) = self.local.get(&fq) {
                    let value = entry.as_hit().map(str::to_string);
                    slot.insert(key.to_string(), decode_opt(key, group, value)?);
                } else {
                    slot.insert(key.to_string(), None);
                    batch.push(fq.clone());
                    origin.insert(fq, (group.to_string(), key.to_string()));
                }
            }
        }

        if !batch.is_empty() {
            debug!(keys = batch.len(), "fetching cache batch");
            let values = self.store.get_many(&batch).await?;

            for (fq, value) in batch.into_iter().zip(values) {
                self.local.insert(fq.clone(), CacheEntry::from(value.clone()));

                if let Some((group, key)) = origin.get(&fq) {
                    let decoded = decode_opt(key, group, value)?;
                    if let Some(slot) = out.get_mut(group) {
                        slot.insert(key.clone(), decoded);
                    }
                }
            }
        }

        Ok(out)
    }

    /// Clears the local tier and flushes the remote store's entire logical
    /// database. Not scoped to the current tenant: every tenant sharing
    /// the database loses its entries.
    pub async fn flush(&mut self) -> Result<(), CacheError> {
        debug!("flushing local tier and remote store");
        self.local.clear();
        self.store.flush_all().await
    }

    /// Points subsequent key building at another tenant. Existing local
    /// entries are untouched; the local tier is keyed by fully-qualified
    /// key, so prior-tenant entries of non-global groups become
    /// unreachable rather than leaking across tenants.
    pub fn switch_tenant(&mut self, tenant_id: impl Into<String>) {
        let tenant_id = tenant_id.into();
        debug!(tenant = %tenant_id, "switching tenant");
        self.tenant.switch(tenant_id);
    }

    /// Marks groups as exempt from tenant namespacing. Additive and
    /// idempotent; already-cached entries keep the keys they were built
    /// with.
    pub fn register_global_groups<I, S>(&mut self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registry.register_global(groups);
    }

    /// Marks groups as local-only. Additive and idempotent.
    pub fn register_non_persistent_groups<I, S>(&mut self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registry.register_non_persistent(groups);
    }
}

fn decode_opt(
    key: &str,
    group: &str,
    value: Option<String>,
) -> Result<Option<Value>, CacheError> {
    match value {
        Some(json) => serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| {
                CacheError::serialization(format!(
                    "failed to decode cached value for '{key}' in '{group}': {e}"
                ))
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MockStore, StaticHost};
    use serde_json::json;

    fn manager(store: Arc<MockStore>) -> CacheManager {
        CacheManager::new(store, Arc::new(StaticHost::single_tenant()))
    }

    #[tokio::test]
    async fn test_set_then_forced_get_round_trips() {
        let store = Arc::new(MockStore::new());
        let mut cache = manager(store.clone());

        cache.set("post_1", &"hello", "default", None).await.unwrap();

        let value: Option<String> = cache.get("post_1", "default", true).await.unwrap();
        assert_eq!(value, Some("hello".to_string()));
        assert_eq!(store.calls("set"), 1);
        assert_eq!(store.calls("get"), 1);
    }

    #[tokio::test]
    async fn test_miss_is_cached_and_suppresses_second_remote_get() {
        let store = Arc::new(MockStore::new());
        let mut cache = manager(store.clone());

        let first: Option<String> = cache.get("ghost", "default", false).await.unwrap();
        let second: Option<String> = cache.get("ghost", "default", false).await.unwrap();

        assert!(first.is_none());
        assert!(second.is_none());
        assert_eq!(store.calls("get"), 1);
    }

    #[tokio::test]
    async fn test_local_hit_skips_remote() {
        let store = Arc::new(MockStore::new());
        let mut cache = manager(store.clone());

        cache.set("k", &1, "default", None).await.unwrap();
        let value: Option<i64> = cache.get("k", "default", false).await.unwrap();

        assert_eq!(value, Some(1));
        assert_eq!(store.calls("get"), 0);
    }

    #[tokio::test]
    async fn test_get_returns_independent_copies() {
        let store = Arc::new(MockStore::new());
        let mut cache = manager(store.clone());

        cache
            .set("list", &vec![1, 2, 3], "default", None)
            .await
            .unwrap();

        let mut first: Vec<i64> = cache.get("list", "default", false).await.unwrap().unwrap();
        first.push(4);

        let second: Vec<i64> = cache.get("list", "default", false).await.unwrap().unwrap();
        assert_eq!(second, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_add_twice_keeps_first_value() {
        let store = Arc::new(MockStore::new());
        let mut cache = manager(store.clone());

        assert!(cache.add("k", &"first", "default", None).await.unwrap());
        assert!(!cache.add("k", &"second", "default", None).await.unwrap());

        let value: Option<String> = cache.get("k", "default", false).await.unwrap();
        assert_eq!(value, Some("first".to_string()));
        assert_eq!(store.calls("set"), 1);
    }

    #[tokio::test]
    async fn test_add_over_cached_miss_succeeds() {
        let store = Arc::new(MockStore::new());
        let mut cache = manager(store.clone());

        let _: Option<String> = cache.get("k", "default", false).await.unwrap();
        assert!(cache.add("k", &"v", "default", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_refused_while_suspended() {
        let store = Arc::new(MockStore::new());
        let host = StaticHost {
            additions_suspended: true,
            ..StaticHost::default()
        };
        let mut cache = CacheManager::new(store.clone(), Arc::new(host));

        assert!(!cache.add("k", &"v", "default", None).await.unwrap());
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_replace_on_absent_key_creates_nothing() {
        let store = Arc::new(MockStore::new());
        let mut cache = manager(store.clone());

        assert!(!cache.replace("k", &"v", "default", None).await.unwrap());
        assert_eq!(store.calls("exists"), 1);
        assert_eq!(store.calls("set"), 0);
        assert!(!store.contains("default:k"));
    }

    #[tokio::test]
    async fn test_replace_consults_store_not_local_tier() {
        // Fresh process: local tier empty, remote value present.
        let store = Arc::new(MockStore::new().with_entry("default:k", "\"old\""));
        let mut cache = manager(store.clone());

        assert!(cache.replace("k", &"new", "default", None).await.unwrap());

        let value: Option<String> = cache.get("k", "default", true).await.unwrap();
        assert_eq!(value, Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_delete_then_get_misses() {
        let store = Arc::new(MockStore::new());
        let mut cache = manager(store.clone());

        cache.set("k", &"v", "default", None).await.unwrap();
        assert!(cache.delete("k", "default").await.unwrap());

        let value: Option<String> = cache.get("k", "default", false).await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_incr_then_negative_offset() {
        let store = Arc::new(MockStore::new());
        let mut cache = manager(store.clone());

        assert_eq!(cache.incr("hits", 5, "default").await.unwrap(), 5);
        assert_eq!(cache.incr("hits", -2, "default").await.unwrap(), 3);
        assert_eq!(store.calls("incr_by"), 2);
    }

    #[tokio::test]
    async fn test_decr_negates_offset() {
        let store = Arc::new(MockStore::new());
        let mut cache = manager(store.clone());

        cache.incr("hits", 10, "default").await.unwrap();
        assert_eq!(cache.decr("hits", 4, "default").await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_incr_mirrors_remote_value_locally() {
        let store = Arc::new(MockStore::new());
        let mut cache = manager(store.clone());

        cache.incr("hits", 3, "default").await.unwrap();

        // Unforced get answers from the mirror, no extra round trip.
        let value: Option<i64> = cache.get("hits", "default", false).await.unwrap();
        assert_eq!(value, Some(3));
        assert_eq!(store.calls("get"), 0);
    }

    #[tokio::test]
    async fn test_non_persistent_group_never_reaches_store() {
        let store = Arc::new(MockStore::new());
        let mut cache = manager(store.clone());

        cache.set("n", &1, "counts", None).await.unwrap();
        let value: Option<i64> = cache.get("n", "counts", false).await.unwrap();
        assert_eq!(value, Some(1));

        assert!(cache.delete("n", "counts").await.unwrap());
        assert_eq!(cache.incr("n", 2, "counts").await.unwrap(), 2);
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_non_persistent_incr_treats_missing_as_zero() {
        let store = Arc::new(MockStore::new());
        let mut cache = manager(store.clone());

        assert_eq!(cache.incr("fresh", 7, "counts").await.unwrap(), 7);
        assert_eq!(cache.decr("fresh", 2, "counts").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_non_persistent_incr_saturates_at_bounds() {
        let store = Arc::new(MockStore::new());
        let mut cache = manager(store.clone());

        assert_eq!(
            cache.incr("big", i64::MAX, "counts").await.unwrap(),
            i64::MAX
        );
        assert_eq!(cache.incr("big", 1, "counts").await.unwrap(), i64::MAX);
        assert_eq!(
            cache.decr("small", i64::MAX, "counts").await.unwrap(),
            -i64::MAX
        );
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_non_persistent_replace_requires_local_entry() {
        let store = Arc::new(MockStore::new());
        let mut cache = manager(store.clone());

        assert!(!cache.replace("k", &"v", "counts", None).await.unwrap());

        cache.set("k", &"v", "counts", None).await.unwrap();
        assert!(cache.replace("k", &"w", "counts", None).await.unwrap());
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_get_multi_batches_only_unknown_keys() {
        let store = Arc::new(
            MockStore::new()
                .with_entry("default:k2", "\"v2\"")
                .with_entry("options:k3", "\"v3\""),
        );
        let mut cache = manager(store.clone());

        // k1 is already locally cached.
        cache.set("k1", &"v1", "default", None).await.unwrap();
        let sets_before = store.calls("set");

        let out = cache
            .get_multi(&[("default", vec!["k1", "k2"]), ("options", vec!["k3"])])
            .await
            .unwrap();

        assert_eq!(store.calls("get_many"), 1);
        assert_eq!(store.calls("get"), 0);
        assert_eq!(store.calls("set"), sets_before);

        assert_eq!(out["default"]["k1"], Some(json!("v1")));
        assert_eq!(out["default"]["k2"], Some(json!("v2")));
        assert_eq!(out["options"]["k3"], Some(json!("v3")));
    }

    #[tokio::test]
    async fn test_get_multi_skips_batch_when_everything_is_local() {
        let store = Arc::new(MockStore::new());
        let mut cache = manager(store.clone());

        cache.set("k1", &1, "default", None).await.unwrap();
        // A cached miss counts as locally known too.
        let _: Option<i64> = cache.get("k2", "default", false).await.unwrap();
        let calls_before = store.total_calls();

        let out = cache
            .get_multi(&[("default", vec!["k1", "k2"])])
            .await
            .unwrap();

        assert_eq!(store.total_calls(), calls_before);
        assert_eq!(out["default"]["k1"], Some(json!(1)));
        assert_eq!(out["default"]["k2"], None);
    }

    #[tokio::test]
    async fn test_get_multi_reports_every_requested_key() {
        let store = Arc::new(MockStore::new());
        let mut cache = manager(store.clone());

        let out = cache
            .get_multi(&[("default", vec!["a", "b"]), ("counts", vec!["c"])])
            .await
            .unwrap();

        assert_eq!(out["default"]["a"], None);
        assert_eq!(out["default"]["b"], None);
        assert_eq!(out["counts"]["c"], None);
    }

    #[tokio::test]
    async fn test_get_multi_memoizes_batch_misses() {
        let store = Arc::new(MockStore::new());
        let mut cache = manager(store.clone());

        cache
            .get_multi(&[("default", vec!["ghost"])])
            .await
            .unwrap();

        // The miss from the batch answers the follow-up get locally.
        let value: Option<String> = cache.get("ghost", "default", false).await.unwrap();
        assert!(value.is_none());
        assert_eq!(store.calls("get"), 0);
    }

    #[tokio::test]
    async fn test_flush_clears_both_tiers() {
        let store = Arc::new(MockStore::new());
        let mut cache = manager(store.clone());

        cache.set("k", &"v", "default", None).await.unwrap();
        cache.flush().await.unwrap();

        let value: Option<String> = cache.get("k", "default", false).await.unwrap();
        assert!(value.is_none());
        assert_eq!(store.calls("flush_all"), 1);
        // The local tier was cleared too: the get had to go remote.
        assert_eq!(store.calls("get"), 1);
    }

    #[tokio::test]
    async fn test_remote_write_failure_is_an_error() {
        let store = Arc::new(MockStore::new().with_error("connection reset"));
        let mut cache = manager(store.clone());

        let result = cache.set("k", &"v", "default", None).await;
        assert!(matches!(result, Err(CacheError::Backend { .. })));
    }

    #[tokio::test]
    async fn test_tenant_switch_isolates_non_global_groups() {
        let store = Arc::new(MockStore::new());
        let host = StaticHost::for_tenant("7");
        let mut cache = CacheManager::new(store.clone(), Arc::new(host));

        cache.set("k", &"seven", "default", None).await.unwrap();
        cache.set("alice", &"user", "users", None).await.unwrap();
        assert!(store.contains("7:default:k"));
        assert!(store.contains("users:alice"));

        cache.switch_tenant("8");

        // The prior tenant's entry is unreachable: this get goes remote
        // under the new tenant's key and misses.
        let value: Option<String> = cache.get("k", "default", false).await.unwrap();
        assert!(value.is_none());
        assert_eq!(store.calls("get"), 1);

        // Global groups still answer from the local tier.
        let user: Option<String> = cache.get("alice", "users", false).await.unwrap();
        assert_eq!(user, Some("user".to_string()));
        assert_eq!(store.calls("get"), 1);
    }

    #[tokio::test]
    async fn test_runtime_group_registration() {
        let store = Arc::new(MockStore::new());
        let mut cache = manager(store.clone());

        cache.register_non_persistent_groups(["scratch"]);
        cache.set("k", &1, "scratch", None).await.unwrap();
        assert_eq!(store.total_calls(), 0);

        let host = StaticHost::for_tenant("7");
        let mut tenant_cache = CacheManager::new(store.clone(), Arc::new(host));
        tenant_cache.register_global_groups(["sessions"]);
        tenant_cache.set("s", &1, "sessions", None).await.unwrap();
        assert!(store.contains("sessions:s"));
    }
}
