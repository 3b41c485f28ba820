//! Host application queries the cache depends on

use std::fmt::Debug;

/// Queries answered by the embedding application.
///
/// The manager reads the tenant id and the multi-tenancy mode once at
/// construction; `additions_suspended` is consulted on every `add`, so a
/// host can veto cache population during imports or migrations.
pub trait HostContext: Send + Sync + Debug {
    /// When true, `add` refuses to create new entries.
    fn additions_suspended(&self) -> bool {
        false
    }

    /// The tenant the current request belongs to. Empty in single-tenant
    /// deployments.
    fn current_tenant(&self) -> String {
        String::new()
    }

    /// Whether keys for non-global groups are tenant-prefixed.
    fn multi_tenant(&self) -> bool {
        false
    }
}

/// A fixed-answer host, for single-tenant deployments and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticHost {
    pub additions_suspended: bool,
    pub tenant_id: String,
    pub multi_tenant: bool,
}

impl StaticHost {
    pub fn single_tenant() -> Self {
        Self::default()
    }

    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            additions_suspended: false,
            tenant_id: tenant_id.into(),
            multi_tenant: true,
        }
    }
}

impl HostContext for StaticHost {
    fn additions_suspended(&self) -> bool {
        self.additions_suspended
    }

    fn current_tenant(&self) -> String {
        self.tenant_id.clone()
    }

    fn multi_tenant(&self) -> bool {
        self.multi_tenant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_tenant_defaults() {
        let host = StaticHost::single_tenant();
        assert!(!host.additions_suspended());
        assert_eq!(host.current_tenant(), "");
        assert!(!host.multi_tenant());
    }

    #[test]
    fn test_multi_tenant_host() {
        let host = StaticHost::for_tenant("12");
        assert_eq!(host.current_tenant(), "12");
        assert!(host.multi_tenant());
    }
}
