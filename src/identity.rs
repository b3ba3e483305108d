//! Identity cache.
//!
//! Guarantees at most one live in-memory handle per persisted or physical
//! entity. Handles are indexed by path and, once persisted, by numeric id.
//! The cache is plain instance state; owners serialize access to it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

/// Lock an identity cache (or any bookkeeping state) held behind a mutex.
///
/// Cache updates never leave partial state behind, so a poisoned lock is
/// recovered rather than propagated.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Key addressing a cached handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKey<'a> {
    /// Lookup by path.
    Path(&'a str),
    /// Lookup by numeric id.
    Id(i64),
}

/// Two-index single-instance cache of `Arc<T>` handles.
#[derive(Debug)]
pub struct IdentityCache<T> {
    by_path: HashMap<String, Arc<T>>,
    by_id: HashMap<i64, Arc<T>>,
}

impl<T> Default for IdentityCache<T> {
    fn default() -> Self {
        Self {
            by_path: HashMap::new(),
            by_id: HashMap::new(),
        }
    }
}

impl<T> IdentityCache<T> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the handle cached under `path`.
    pub fn get_by_path(&self, path: &str) -> Option<Arc<T>> {
        self.by_path.get(path).cloned()
    }

    /// Get the handle cached under `id`.
    pub fn get_by_id(&self, id: i64) -> Option<Arc<T>> {
        self.by_id.get(&id).cloned()
    }

    /// Get a handle by either key.
    pub fn get(&self, key: CacheKey<'_>) -> Option<Arc<T>> {
        match key {
            CacheKey::Path(path) => self.get_by_path(path),
            CacheKey::Id(id) => self.get_by_id(id),
        }
    }

    /// Cache `handle` under `path` (and `id` if given).
    ///
    /// If a handle is already cached under either key, that handle is kept
    /// and returned instead, so callers always end up sharing one instance.
    pub fn insert(&mut self, path: impl Into<String>, id: Option<i64>, handle: Arc<T>) -> Arc<T> {
        let path = path.into();
        let existing = self
            .by_path
            .get(&path)
            .or_else(|| id.and_then(|id| self.by_id.get(&id)))
            .cloned();
        let handle = existing.unwrap_or(handle);

        self.by_path.insert(path, Arc::clone(&handle));
        if let Some(id) = id {
            self.by_id.insert(id, Arc::clone(&handle));
        }
        handle
    }

    /// Move the handle cached under `old_path` to `new_path`.
    ///
    /// The new key is inserted before the old one is removed. Returns the
    /// moved handle, or `None` if nothing was cached under `old_path`.
    pub fn rekey(&mut self, old_path: &str, new_path: impl Into<String>) -> Option<Arc<T>> {
        let handle = self.by_path.get(old_path).cloned()?;
        let new_path = new_path.into();
        if new_path == old_path {
            return Some(handle);
        }
        debug!(old = old_path, new = %new_path, "rekey cached handle");
        self.by_path.insert(new_path, Arc::clone(&handle));
        self.by_path.remove(old_path);
        Some(handle)
    }

    /// Rekey every path starting with `old_prefix` onto `new_prefix`.
    ///
    /// Returns the moved handles paired with their new paths.
    pub fn rekey_prefix(&mut self, old_prefix: &str, new_prefix: &str) -> Vec<(String, Arc<T>)> {
        let affected: Vec<String> = self
            .by_path
            .keys()
            .filter(|key| key.starts_with(old_prefix))
            .cloned()
            .collect();

        let mut moved = Vec::with_capacity(affected.len());
        for old in affected {
            let new = format!("{new_prefix}{}", &old[old_prefix.len()..]);
            if let Some(handle) = self.rekey(&old, new.clone()) {
                moved.push((new, handle));
            }
        }
        moved
    }

    /// Evict the handle addressed by `key` from both indexes.
    pub fn evict(&mut self, key: CacheKey<'_>) -> Option<Arc<T>> {
        let handle = self.get(key)?;
        self.by_path.retain(|_, h| !Arc::ptr_eq(h, &handle));
        self.by_id.retain(|_, h| !Arc::ptr_eq(h, &handle));
        Some(handle)
    }

    /// Evict every handle whose path starts with `prefix`.
    pub fn evict_prefix(&mut self, prefix: &str) -> Vec<Arc<T>> {
        let keys: Vec<String> = self
            .by_path
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();

        keys.iter()
            .filter_map(|key| self.evict(CacheKey::Path(key)))
            .collect()
    }

    /// All distinct cached handles.
    pub fn handles(&self) -> Vec<Arc<T>> {
        let mut handles: Vec<Arc<T>> = Vec::with_capacity(self.by_path.len());
        for handle in self.by_path.values().chain(self.by_id.values()) {
            if !handles.iter().any(|h| Arc::ptr_eq(h, handle)) {
                handles.push(Arc::clone(handle));
            }
        }
        handles
    }

    /// Number of path keys.
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    /// Whether the cache holds no handles.
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty() && self.by_id.is_empty()
    }

    /// Drop every cached handle.
    pub fn clear(&mut self) {
        self.by_path.clear();
        self.by_id.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup_share_handle() {
        let mut cache = IdentityCache::new();
        let handle = cache.insert("docs/", Some(1), Arc::new("docs"));

        let by_path = cache.get_by_path("docs/").unwrap();
        let by_id = cache.get_by_id(1).unwrap();

        assert!(Arc::ptr_eq(&handle, &by_path));
        assert!(Arc::ptr_eq(&handle, &by_id));
    }

    #[test]
    fn test_insert_keeps_existing_handle() {
        let mut cache = IdentityCache::new();
        let first = cache.insert("docs/", Some(1), Arc::new(String::from("first")));
        let second = cache.insert("docs/", Some(1), Arc::new(String::from("second")));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.as_str(), "first");
    }

    #[test]
    fn test_insert_without_id() {
        let mut cache = IdentityCache::new();
        cache.insert("/srv/assets/a.txt", None, Arc::new(()));

        assert!(cache.get_by_path("/srv/assets/a.txt").is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_rekey_moves_path_and_keeps_id() {
        let mut cache = IdentityCache::new();
        let handle = cache.insert("old/", Some(7), Arc::new(7));

        let moved = cache.rekey("old/", "new/").unwrap();

        assert!(Arc::ptr_eq(&handle, &moved));
        assert!(cache.get_by_path("old/").is_none());
        assert!(Arc::ptr_eq(&cache.get_by_path("new/").unwrap(), &handle));
        assert!(Arc::ptr_eq(&cache.get_by_id(7).unwrap(), &handle));
    }

    #[test]
    fn test_rekey_missing() {
        let mut cache: IdentityCache<i32> = IdentityCache::new();
        assert!(cache.rekey("nothing/", "else/").is_none());
    }

    #[test]
    fn test_rekey_prefix() {
        let mut cache = IdentityCache::new();
        cache.insert("a/", Some(1), Arc::new(1));
        cache.insert("a/b/", Some(2), Arc::new(2));
        cache.insert("ab/", Some(3), Arc::new(3));

        let moved = cache.rekey_prefix("a/", "z/");

        assert_eq!(moved.len(), 2);
        assert!(cache.get_by_path("z/").is_some());
        assert!(cache.get_by_path("z/b/").is_some());
        assert!(cache.get_by_path("ab/").is_some());
        assert!(cache.get_by_path("a/").is_none());
        assert!(cache.get_by_path("a/b/").is_none());
    }

    #[test]
    fn test_evict_by_id_clears_path() {
        let mut cache = IdentityCache::new();
        cache.insert("docs/", Some(1), Arc::new(1));

        assert!(cache.evict(CacheKey::Id(1)).is_some());
        assert!(cache.get_by_path("docs/").is_none());
        assert!(cache.get_by_id(1).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_evict_by_path_clears_id() {
        let mut cache = IdentityCache::new();
        cache.insert("docs/", Some(1), Arc::new(1));

        cache.evict(CacheKey::Path("docs/"));
        assert!(cache.get_by_id(1).is_none());
    }

    #[test]
    fn test_evict_prefix() {
        let mut cache = IdentityCache::new();
        cache.insert("a/", Some(1), Arc::new(1));
        cache.insert("a/b/", Some(2), Arc::new(2));
        cache.insert("c/", Some(3), Arc::new(3));

        let evicted = cache.evict_prefix("a/");

        assert_eq!(evicted.len(), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get_by_id(2).is_none());
    }

    #[test]
    fn test_handles_are_distinct() {
        let mut cache = IdentityCache::new();
        cache.insert("a/", Some(1), Arc::new(1));
        cache.insert("b/", Some(2), Arc::new(2));

        assert_eq!(cache.handles().len(), 2);

        cache.clear();
        assert!(cache.handles().is_empty());
    }
}
