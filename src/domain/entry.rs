//! Local cache entries and the negative-caching sentinel

/// A single entry in the local tier.
///
/// `Miss` records "confirmed absent in the remote store as of the last
/// check". It is distinct from the entry not being present at all (which
/// means "unknown, ask the remote store") and from any legitimately stored
/// value, including falsy ones like `0`, `""` or `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry {
    /// A known value, stored as its JSON encoding.
    Hit(String),
    /// Confirmed absent remotely.
    Miss,
}

impl CacheEntry {
    /// Returns the JSON payload for a hit, `None` for a miss.
    pub fn as_hit(&self) -> Option<&str> {
        match self {
            CacheEntry::Hit(json) => Some(json),
            CacheEntry::Miss => None,
        }
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, CacheEntry::Miss)
    }

    /// Interprets the entry as an integer counter.
    ///
    /// Misses and non-numeric payloads count as zero, matching the local
    /// increment semantics for non-persistent groups.
    pub fn as_counter(&self) -> i64 {
        match self {
            CacheEntry::Hit(json) => json.parse().unwrap_or(0),
            CacheEntry::Miss => 0,
        }
    }
}

impl From<Option<String>> for CacheEntry {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(json) => CacheEntry::Hit(json),
            None => CacheEntry::Miss,
        }
    }
}
