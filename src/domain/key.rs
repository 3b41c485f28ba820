//! Tenant context and fully-qualified key building

use crate::domain::group::GroupRegistry;

/// The tenant the cache is currently scoped to.
///
/// In single-tenant mode the prefix is always empty, whatever tenant id
/// was supplied. Switching tenants changes key building for subsequent
/// calls only; it never rewrites entries already in the local tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: String,
    multi_tenant: bool,
}

impl TenantContext {
    pub fn new(tenant_id: impl Into<String>, multi_tenant: bool) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            multi_tenant,
        }
    }

    pub fn single_tenant() -> Self {
        Self::new("", false)
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn switch(&mut self, tenant_id: impl Into<String>) {
        self.tenant_id = tenant_id.into();
    }

    /// The namespace prefix applied to non-global groups.
    pub fn prefix(&self) -> String {
        if self.multi_tenant && !self.tenant_id.is_empty() {
            format!("{}:", self.tenant_id)
        } else {
            String::new()
        }
    }
}

/// Builds the fully-qualified remote key for `(key, group)`.
///
/// Layout is `{tenant:}{group}:{key}`, with the tenant prefix omitted for
/// global groups. Pure function of its inputs; distinct `(tenant, group,
/// key)` triples never collide for non-global groups, and global groups
/// produce the same key under every tenant.
pub fn build_key(key: &str, group: &str, tenant: &TenantContext, registry: &GroupRegistry) -> String {
    let prefix = if registry.is_global(group) {
        String::new()
    } else {
        tenant.prefix()
    };
    format!("{prefix}{group}:{key}")
}
