//! Group classification: tenant scoping and persistence routing

use std::collections::HashSet;

/// The group used when callers don't name one.
pub const DEFAULT_GROUP: &str = "default";

/// Registry of group attributes.
///
/// Groups have two independent attributes: *global* groups bypass tenant
/// namespacing in key building, *non-persistent* groups never reach the
/// remote store. Both sets grow through registration and never shrink;
/// registration is idempotent and affects only subsequent calls, never
/// entries already cached.
#[derive(Debug, Clone)]
pub struct GroupRegistry {
    global: HashSet<String>,
    non_persistent: HashSet<String>,
}

impl GroupRegistry {
    /// Creates a registry with the stock memberships: site- and user-level
    /// groups are global, chatter like comment counts stays local.
    pub fn new() -> Self {
        let global = [
            "blog-details",
            "blog-id-cache",
            "blog-lookup",
            "global-posts",
            "networks",
            "rss",
            "sites",
            "site-details",
            "site-lookup",
            "site-options",
            "site-transient",
            "users",
            "useremail",
            "userlogins",
            "usermeta",
            "user_meta",
            "userslugs",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let non_persistent = ["comment", "counts"].into_iter().map(String::from).collect();

        Self {
            global,
            non_persistent,
        }
    }

    /// Creates a registry with no memberships at all.
    pub fn empty() -> Self {
        Self {
            global: HashSet::new(),
            non_persistent: HashSet::new(),
        }
    }

    pub fn is_global(&self, group: &str) -> bool {
        self.global.contains(group)
    }

    /// A group is persistent unless it was registered as non-persistent.
    pub fn is_persistent(&self, group: &str) -> bool {
        !self.non_persistent.contains(group)
    }

    pub fn register_global<I, S>(&mut self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.global.extend(groups.into_iter().map(Into::into));
    }

    pub fn register_non_persistent<I, S>(&mut self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.non_persistent
            .extend(groups.into_iter().map(Into::into));
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}
