//! Hash cache keyed by file fingerprint.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use crate::hash::HashAlgorithm;

#[derive(Clone, Debug)]
struct CacheEntry {
    hash: String,
    size: u64,
    mtime: SystemTime,
    cached_at: SystemTime,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<(PathBuf, HashAlgorithm), CacheEntry>,
    hits: u64,
    misses: u64,
}

/// Concurrent cache of file hashes.
///
/// An entry is valid only while the file's `(size, mtime)` fingerprint is
/// unchanged; a lookup with a stale fingerprint misses and the caller is
/// expected to recompute and [`insert`](Self::insert). Entries also record
/// the algorithm that produced them, so an MD5 hash can never satisfy a
/// SHA-256 lookup.
#[derive(Debug, Default)]
pub struct HashCache {
    state: Mutex<CacheState>,
}

impl HashCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached hash for `path` when the fingerprint still matches.
    pub fn lookup(
        &self,
        path: &Path,
        algorithm: HashAlgorithm,
        size: u64,
        mtime: SystemTime,
    ) -> Option<String> {
        let mut state = self.state.lock().expect("hash cache mutex poisoned");
        let key = (path.to_path_buf(), algorithm);
        match state.entries.get(&key) {
            Some(entry) if entry.size == size && entry.mtime == mtime => {
                let hash = entry.hash.clone();
                state.hits += 1;
                Some(hash)
            }
            _ => {
                state.misses += 1;
                None
            }
        }
    }

    /// Stores (or overwrites) the hash for `path` under its fingerprint.
    pub fn insert(
        &self,
        path: &Path,
        algorithm: HashAlgorithm,
        size: u64,
        mtime: SystemTime,
        hash: String,
    ) {
        let mut state = self.state.lock().expect("hash cache mutex poisoned");
        state.entries.insert(
            (path.to_path_buf(), algorithm),
            CacheEntry {
                hash,
                size,
                mtime,
                cached_at: SystemTime::now(),
            },
        );
    }

    /// Drops every cached entry for `path`.
    pub fn invalidate(&self, path: &Path) {
        let mut state = self.state.lock().expect("hash cache mutex poisoned");
        state.entries.retain(|(cached_path, _), _| cached_path != path);
    }

    /// Removes all entries.
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("hash cache mutex poisoned");
        state.entries.clear();
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().expect("hash cache mutex poisoned").entries.len()
    }

    /// Returns `true` when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of lookups answered from the cache.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.state.lock().expect("hash cache mutex poisoned").hits
    }

    /// Number of lookups that required a recompute.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.state.lock().expect("hash cache mutex poisoned").misses
    }

    /// Wall-clock insertion time of the entry for `path`, if cached.
    #[must_use]
    pub fn cached_at(&self, path: &Path, algorithm: HashAlgorithm) -> Option<SystemTime> {
        let state = self.state.lock().expect("hash cache mutex poisoned");
        state
            .entries
            .get(&(path.to_path_buf(), algorithm))
            .map(|entry| entry.cached_at)
    }
}
