use std::num::NonZeroUsize;
use std::sync::Mutex;

use blobtier_types::ObjectPath;
use bytes::Bytes;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Bounds for the memory tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached objects.
    ///
    /// `DriverConfig::validate` rejects zero. A `MemoryCache` built
    /// directly from a zero bound holds a single object.
    pub max_entries: usize,
    /// Optional ceiling on the summed size of cached content.
    pub max_bytes: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 1024, max_bytes: None }
    }
}

/// Point-in-time counters for the memory tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
    pub bytes: u64,
}

impl CacheStats {
    /// Fraction of lookups served from memory, 0.0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Inner {
    entries: LruCache<ObjectPath, Bytes>,
    bytes: u64,
    max_bytes: Option<u64>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl Inner {
    fn evict_lru(&mut self) -> bool {
        match self.entries.pop_lru() {
            Some((path, data)) => {
                self.bytes -= data.len() as u64;
                self.evictions += 1;
                debug!(path = %path, len = data.len(), "evicted from memory tier");
                true
            }
            None => false,
        }
    }
}

/// Bounded LRU cache of object content.
///
/// The structure sits behind a single `Mutex`; values are [`Bytes`] so a hit
/// hands back a reference-counted view without copying.
pub struct MemoryCache {
    inner: Mutex<Inner>,
}

impl MemoryCache {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                bytes: 0,
                max_bytes: config.max_bytes,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    /// Return the cached content for `path` and mark it most recently used.
    pub fn lookup(&self, path: &ObjectPath) -> Option<Bytes> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        match inner.entries.get(path).cloned() {
            Some(data) => {
                inner.hits += 1;
                Some(data)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert or overwrite `path`, evicting older entries as needed.
    ///
    /// Content larger than the byte budget is not cached at all, and any
    /// previous entry for `path` is dropped so a lookup cannot return stale
    /// bytes.
    pub fn insert(&self, path: ObjectPath, content: Bytes) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        let len = content.len() as u64;

        if inner.max_bytes.is_some_and(|max| len > max) {
            if let Some(old) = inner.entries.pop(&path) {
                inner.bytes -= old.len() as u64;
            }
            debug!(path = %path, len, "content exceeds memory budget; not cached");
            return;
        }

        inner.bytes += len;
        if let Some((old_path, old)) = inner.entries.push(path.clone(), content) {
            inner.bytes -= old.len() as u64;
            if old_path != path {
                inner.evictions += 1;
                debug!(path = %old_path, len = old.len(), "evicted from memory tier");
            }
        }

        if let Some(max) = inner.max_bytes {
            while inner.bytes > max {
                // The entry just inserted is MRU and fits on its own, so this
                // stops before reaching it.
                if !inner.evict_lru() {
                    break;
                }
            }
        }
    }

    /// Drop `path` from the cache. No-op when absent.
    pub fn invalidate(&self, path: &ObjectPath) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if let Some(old) = inner.entries.pop(path) {
            inner.bytes -= old.len() as u64;
        }
    }

    /// Drop `prefix` and every entry beneath it. Returns how many were dropped.
    pub fn invalidate_prefix(&self, prefix: &ObjectPath) -> usize {
        let mut inner = self.inner.lock().expect("lock poisoned");
        let doomed: Vec<ObjectPath> = inner
            .entries
            .iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .map(|(path, _)| path.clone())
            .collect();
        for path in &doomed {
            if let Some(old) = inner.entries.pop(path) {
                inner.bytes -= old.len() as u64;
            }
        }
        doomed.len()
    }

    /// Check presence without touching recency or statistics.
    pub fn contains(&self, path: &ObjectPath) -> bool {
        self.inner.lock().expect("lock poisoned").entries.contains(path)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. Statistics are kept.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.entries.clear();
        inner.bytes = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().expect("lock poisoned");
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            entries: inner.entries.len(),
            bytes: inner.bytes,
        }
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache").field("stats", &self.stats()).finish()
    }
}
