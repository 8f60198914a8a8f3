use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tracing::{Level, event};

use crate::core::Result;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub size: usize,
}

/// Concurrent get-or-add cache. Entries are never evicted.
///
/// The factory runs outside the map lock, so two racing callers may both build
/// a value for the same key; the first one published wins and both callers get
/// it. Failed builds publish nothing.
#[derive(Debug)]
pub struct ShapeCache<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, V>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<K, V> ShapeCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn get_or_try_insert_with<F>(&self, key: &K, build: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(found) = self.get(key) {
            // Stats are best-effort; relaxed ordering is enough.
            self.hits.fetch_add(1, Ordering::Relaxed);
            event!(Level::TRACE, size = self.entries.len(), "cache hit");
            return Ok(found);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let built = build()?;
        Ok(self
            .entries
            .entry(key.clone())
            .or_insert(built)
            .value()
            .clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.entries.len(),
        }
    }
}

impl<K, V> Default for ShapeCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
