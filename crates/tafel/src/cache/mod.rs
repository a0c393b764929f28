//! Page result cache.
//!
//! [`TableCache`] is an in-memory LRU keyed by document fingerprint and page index. It is
//! an explicit object owned by whoever creates it (normally one per
//! [`TableAnalyzer`](crate::core::analyzer::TableAnalyzer)); there is no global cache.
//!
//! # Concurrency contract
//!
//! For any key, at most one computation runs at a time. Concurrent callers of
//! [`TableCache::get_or_compute`] for a key that is being computed block until that
//! computation finishes and then read its result. If the computation fails or panics the
//! key is released and the next waiter computes it.
//!
//! Only successful page results are stored. A capacity of 0 disables caching: every call
//! computes and nothing is stored or deduplicated.

use crate::error::{Result, TafelError};
use crate::types::Table;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// Cache key: content fingerprint of the document (including the configuration it was
/// analysed with) plus the page index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageCacheKey {
    pub fingerprint: String,
    pub page_index: usize,
}

impl PageCacheKey {
    pub fn new(fingerprint: impl Into<String>, page_index: usize) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            page_index,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Outcome of [`TableCache::get_or_compute`].
#[derive(Debug)]
pub enum CacheFetch<E> {
    /// The tables were already cached (possibly computed by a concurrent caller).
    Hit(Arc<Vec<Table>>),
    /// This call ran the computation.
    Computed(Arc<Vec<Table>>),
    /// This call ran the computation and it failed; nothing was stored.
    Failed(E),
}

#[derive(Debug, Default)]
struct CacheState {
    entries: IndexMap<PageCacheKey, Arc<Vec<Table>>>,
    in_flight: HashSet<PageCacheKey>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl CacheState {
    /// Look up a key and mark it most recently used.
    fn touch(&mut self, key: &PageCacheKey) -> Option<Arc<Vec<Table>>> {
        let index = self.entries.get_index_of(key)?;
        let last = self.entries.len() - 1;
        self.entries.move_index(index, last);
        self.entries.get_index(last).map(|(_, tables)| Arc::clone(tables))
    }

    fn insert(&mut self, key: PageCacheKey, tables: Arc<Vec<Table>>, capacity: usize) {
        self.entries.shift_remove(&key);
        self.entries.insert(key, tables);
        while self.entries.len() > capacity {
            if self.entries.shift_remove_index(0).is_some() {
                self.evictions += 1;
            }
        }
    }
}

/// Thread-safe LRU cache of per-page table results.
#[derive(Debug)]
pub struct TableCache {
    capacity: usize,
    state: Mutex<CacheState>,
    ready: Condvar,
}

impl TableCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(CacheState::default()),
            ready: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheState>> {
        self.state
            .lock()
            .map_err(|e| TafelError::LockPoisoned(format!("table cache state: {}", e)))
    }

    /// Look up a page, counting a hit or a miss.
    pub fn get(&self, key: &PageCacheKey) -> Result<Option<Arc<Vec<Table>>>> {
        let mut state = self.lock()?;
        let found = state.touch(key);
        if found.is_some() {
            state.hits += 1;
        } else {
            state.misses += 1;
        }
        Ok(found)
    }

    /// Store a page result, evicting the least recently used entry when full.
    pub fn insert(&self, key: PageCacheKey, tables: Vec<Table>) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let mut state = self.lock()?;
        state.insert(key, Arc::new(tables), self.capacity);
        Ok(())
    }

    /// Return the cached tables for `key`, or run `compute` exactly once to produce them.
    ///
    /// # Errors
    ///
    /// Returns `TafelError::LockPoisoned` when the cache state is corrupted by a panic
    /// while it was locked. Failures of `compute` itself are returned as
    /// [`CacheFetch::Failed`].
    pub fn get_or_compute<E, F>(&self, key: PageCacheKey, compute: F) -> Result<CacheFetch<E>>
    where
        F: FnOnce() -> std::result::Result<Vec<Table>, E>,
    {
        if !self.is_enabled() {
            return Ok(match compute() {
                Ok(tables) => CacheFetch::Computed(Arc::new(tables)),
                Err(e) => CacheFetch::Failed(e),
            });
        }

        let mut state = self.lock()?;
        loop {
            if let Some(tables) = state.touch(&key) {
                state.hits += 1;
                return Ok(CacheFetch::Hit(tables));
            }
            if !state.in_flight.contains(&key) {
                break;
            }
            state = self
                .ready
                .wait(state)
                .map_err(|e| TafelError::LockPoisoned(format!("table cache state: {}", e)))?;
        }
        state.misses += 1;
        state.in_flight.insert(key.clone());
        drop(state);

        let guard = InFlight {
            cache: self,
            key: Some(key),
        };
        match compute() {
            Ok(tables) => {
                let tables = Arc::new(tables);
                guard.complete(Some(Arc::clone(&tables)))?;
                Ok(CacheFetch::Computed(tables))
            }
            Err(e) => {
                guard.complete(None)?;
                Ok(CacheFetch::Failed(e))
            }
        }
    }

    pub fn contains(&self, key: &PageCacheKey) -> Result<bool> {
        Ok(self.lock()?.entries.contains_key(key))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) -> Result<()> {
        self.lock()?.entries.clear();
        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let state = self.lock()?;
        Ok(CacheStats {
            entries: state.entries.len(),
            capacity: self.capacity,
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
        })
    }
}

/// Releases an in-flight key and wakes waiters, also when the computation panics.
struct InFlight<'a> {
    cache: &'a TableCache,
    key: Option<PageCacheKey>,
}

impl InFlight<'_> {
    fn complete(mut self, tables: Option<Arc<Vec<Table>>>) -> Result<()> {
        let Some(key) = self.key.take() else {
            return Ok(());
        };
        let result = self.cache.lock().map(|mut state| {
            state.in_flight.remove(&key);
            if let Some(tables) = tables {
                state.insert(key, tables, self.cache.capacity);
            }
        });
        self.cache.ready.notify_all();
        result
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            if let Ok(mut state) = self.cache.state.lock() {
                state.in_flight.remove(&key);
            }
            self.cache.ready.notify_all();
        }
    }
}
