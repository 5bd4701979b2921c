//! Type-erased result cache storage.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::entry::ResultEntry;

/// A cached result entry with its value type erased.
#[derive(Clone)]
pub struct CachedEntry(Rc<dyn Any>);

impl CachedEntry {
    pub(crate) fn new<T: 'static>(entry: Rc<ResultEntry<T>>) -> Self {
        Self(entry)
    }

    /// Downcast back to the entry of a selector producing `T`.
    pub(crate) fn downcast<T: 'static>(&self) -> Option<Rc<ResultEntry<T>>> {
        self.0.clone().downcast::<ResultEntry<T>>().ok()
    }
}

impl fmt::Debug for CachedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CachedEntry(..)")
    }
}

/// Per-selector storage of result entries, keyed by parameter key.
///
/// Implement this to bound or instrument the cache of a selector, and install
/// it with `SelectorOptions::create_result_cache`. A freshly created cache
/// must be empty.
pub trait ResultCache {
    /// Look up the entry stored under `key`.
    fn get(&self, key: &str) -> Option<CachedEntry>;

    /// Store `entry` under `key`, replacing any previous one.
    fn set(&mut self, key: String, entry: CachedEntry);

    /// Number of stored entries.
    fn len(&self) -> usize;

    /// Returns true if nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Creates a fresh, empty [`ResultCache`].
pub type CacheFactory = Rc<dyn Fn() -> Box<dyn ResultCache>>;

/// Unbounded hash map cache. This is the default.
#[derive(Debug, Default)]
pub struct HashMapResultCache {
    entries: AHashMap<String, CachedEntry>,
}

impl HashMapResultCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultCache for HashMapResultCache {
    fn get(&self, key: &str) -> Option<CachedEntry> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: String, entry: CachedEntry) {
        self.entries.insert(key, entry);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Factory of the default cache.
pub fn default_cache_factory() -> CacheFactory {
    Rc::new(|| Box::new(HashMapResultCache::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_info::DebugInfo;
    use crate::value::Value;

    #[test]
    fn test_hash_map_cache_basic() {
        let mut cache = HashMapResultCache::new();
        assert!(cache.is_empty());

        let entry = Rc::new(ResultEntry::<i64>::blocked(
            Value::Null,
            Rc::new(DebugInfo::new(None)),
        ));
        cache.set("null".to_owned(), CachedEntry::new(entry));
        assert_eq!(cache.len(), 1);

        let cached = cache.get("null").unwrap();
        assert!(cached.downcast::<i64>().is_some());
        // Wrong type
        assert!(cached.downcast::<String>().is_none());
        assert!(cache.get("1").is_none());
    }

    #[test]
    fn test_factory_creates_independent_caches() {
        let factory = default_cache_factory();
        let mut first = factory();
        let entry = Rc::new(ResultEntry::<i64>::blocked(
            Value::Null,
            Rc::new(DebugInfo::new(None)),
        ));
        first.set("k".to_owned(), CachedEntry::new(entry));
        assert_eq!(first.len(), 1);
        assert!(factory().is_empty());
    }
}
