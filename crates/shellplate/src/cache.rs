/*
 * cache.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Identity-keyed cache of render functions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::render::RenderFunction;

type Entries = HashMap<String, RenderFunction>;

/// Shared cache of finalized render functions.
///
/// Clones share the same entries. The first function stored under an
/// identity wins; later stores return the existing entry unless they
/// explicitly [`replace`](TemplateCache::replace) it.
#[derive(Debug, Clone, Default)]
pub struct TemplateCache {
    entries: Arc<Mutex<Entries>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, identity: &str) -> Option<RenderFunction> {
        self.lock().get(identity).cloned()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.lock().contains_key(identity)
    }

    /// Store `function` unless the identity is already cached.
    ///
    /// Returns the entry that ended up in the cache.
    pub fn insert_first(&self, identity: &str, function: RenderFunction) -> RenderFunction {
        self.lock()
            .entry(identity.to_string())
            .or_insert(function)
            .clone()
    }

    /// Store `function`, returning the entry it replaced.
    pub fn replace(&self, identity: &str, function: RenderFunction) -> Option<RenderFunction> {
        self.lock().insert(identity.to_string(), function)
    }

    pub fn remove(&self, identity: &str) -> Option<RenderFunction> {
        self.lock().remove(identity)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Cached identities, sorted.
    pub fn identities(&self) -> Vec<String> {
        let mut identities: Vec<String> = self.lock().keys().cloned().collect();
        identities.sort();
        identities
    }

    /// A handle that does not keep the cache alive.
    ///
    /// Render functions hold this instead of the cache itself, since the
    /// cache holds the render functions.
    pub fn downgrade(&self) -> WeakCache {
        WeakCache(Arc::downgrade(&self.entries))
    }
}

/// Non-owning handle to a [`TemplateCache`].
#[derive(Debug, Clone, Default)]
pub struct WeakCache(Weak<Mutex<Entries>>);

impl WeakCache {
    /// Look up `identity`, if the cache still exists.
    pub fn get(&self, identity: &str) -> Option<RenderFunction> {
        let entries = self.0.upgrade()?;
        let entries = entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.get(identity).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_writer_wins() {
        let cache = TemplateCache::new();
        let first = RenderFunction::noop();
        let second = RenderFunction::noop();

        let stored = cache.insert_first("a", first.clone());
        assert!(stored.ptr_eq(&first));
        let stored = cache.insert_first("a", second.clone());
        assert!(stored.ptr_eq(&first));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_replace_overrides() {
        let cache = TemplateCache::new();
        let first = RenderFunction::noop();
        let second = RenderFunction::noop();
        cache.insert_first("a", first.clone());

        let previous = cache.replace("a", second.clone());
        assert!(previous.is_some_and(|p| p.ptr_eq(&first)));
        assert!(cache.get("a").is_some_and(|f| f.ptr_eq(&second)));
    }

    #[test]
    fn test_weak_handle_follows_cache_lifetime() {
        let cache = TemplateCache::new();
        let weak = cache.downgrade();
        cache.insert_first("b", RenderFunction::noop());
        cache.insert_first("a", RenderFunction::noop());

        assert!(weak.get("a").is_some());
        assert_eq!(cache.identities(), vec!["a".to_string(), "b".to_string()]);
        drop(cache);
        assert!(weak.get("a").is_none());
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = TemplateCache::new();
        cache.insert_first("a", RenderFunction::noop());
        cache.insert_first("b", RenderFunction::noop());
        assert!(cache.remove("a").is_some());
        assert!(!cache.contains("a"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
