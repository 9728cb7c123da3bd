use crate::error::{CacheError, StoreError};
use crate::record::StoredFindings;
use crate::store::ObjectStore;
use log::debug;
use lru::LruCache;
use relint_findings::TrackedFinding;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default number of files kept live in memory.
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Bounded, access-ordered cache of per-file tracked-finding collections.
///
/// Inserting beyond capacity evicts the least recently used entry, which is
/// synchronously written back to the durable store before it leaves memory —
/// eviction transfers ownership, it never discards. All compound operations
/// run under one internal lock; callers holding a tracker lock may call in,
/// the cache never calls back out.
pub struct FindingCache {
    store: ObjectStore<StoredFindings>,
    live: Mutex<LruCache<String, Vec<TrackedFinding>>>,
}

impl FindingCache {
    /// Wraps `store` with an in-memory window of `capacity` files
    /// (values below 1 are clamped to 1).
    pub fn new(store: ObjectStore<StoredFindings>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            live: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// True when `key` has never been analyzed: no live entry *and* no
    /// persisted record. A cache miss with a store hit is not a first
    /// analysis.
    pub fn is_first_analysis(&self, key: &str) -> bool {
        if self.lock_live().contains(key) {
            return false;
        }
        !self.store.contains(key)
    }

    /// The live collection for `key`, touching its recency; `None` when the
    /// entry is not in memory. No store fallback.
    pub fn live(&self, key: &str) -> Option<Vec<TrackedFinding>> {
        self.lock_live().get(key).cloned()
    }

    /// The live collection for `key`, or a hard failure when the file has no
    /// live entry. Consumers that must see UI-linked state use this instead
    /// of silently defaulting to an empty collection.
    pub fn live_or_fail(&self, key: &str) -> Result<Vec<TrackedFinding>, CacheError> {
        self.live(key).ok_or_else(|| CacheError::NotLive(key.to_string()))
    }

    /// The current collection for `key`: the live entry when present,
    /// otherwise whatever the store has. The store fallback does not promote
    /// the entry back into memory.
    pub fn current(&self, key: &str) -> Result<Option<Vec<TrackedFinding>>, StoreError> {
        if let Some(found) = self.live(key) {
            return Ok(Some(found));
        }
        self.stored(key)
    }

    /// Reads and rebuilds the persisted collection for `key`, bypassing the
    /// live map.
    pub fn stored(&self, key: &str) -> Result<Option<Vec<TrackedFinding>>, StoreError> {
        Ok(self.store.read(key)?.and_then(StoredFindings::restore))
    }

    /// Installs `findings` as the live collection for `key`. When this push
    /// exceeds capacity the least recently used entry is persisted and then
    /// dropped from memory.
    pub fn put(&self, key: &str, findings: Vec<TrackedFinding>) -> Result<(), StoreError> {
        let mut live = self.lock_live();
        // push returns the displaced pair; replacing the same key is an
        // update, not an eviction.
        if let Some((old_key, old_findings)) = live.push(key.to_string(), findings) {
            if old_key != key {
                debug!("evicting {old_key} to the issue store");
                self.store
                    .write(&old_key, &StoredFindings::snapshot(&old_findings))?;
            }
        }
        Ok(())
    }

    /// Persists every live entry without evicting any of them.
    pub fn flush_all(&self) -> Result<(), StoreError> {
        let entries: Vec<(String, StoredFindings)> = self
            .lock_live()
            .iter()
            .map(|(key, findings)| (key.clone(), StoredFindings::snapshot(findings)))
            .collect();
        for (key, record) in &entries {
            self.store.write(key, record)?;
        }
        debug!("flushed {} live file(s)", entries.len());
        Ok(())
    }

    /// Persists everything, then drops the live entries. Used at host
    /// shutdown.
    pub fn shutdown(&self) -> Result<(), StoreError> {
        self.flush_all()?;
        self.lock_live().clear();
        Ok(())
    }

    /// Wipes both the live map and the backing store. Used when the user
    /// resets tracking state for the project.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.lock_live().clear();
        self.store.clear()
    }

    /// Drops persisted records whose key fails the validity predicate.
    pub fn prune_stale(&self, is_valid: impl Fn(&str) -> bool) -> Result<usize, StoreError> {
        self.store.delete_invalid(is_valid)
    }

    fn lock_live(&self) -> MutexGuard<'_, LruCache<String, Vec<TrackedFinding>>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
