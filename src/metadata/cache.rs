//! Bounded in-memory cache for catalog metadata lookups.
//!
//! Negative results (the catalog had nothing for a key) are cached too, with
//! a shorter TTL so transient gaps heal faster than positive hits go stale.
//! The cache is a plain value meant to be owned by whoever needs it, never a
//! module-level singleton.

use super::CatalogMetadata;
use std::collections::HashMap;
use std::time::{Duration, Instant};

const DEFAULT_POSITIVE_TTL: Duration = Duration::from_secs(15 * 60);
const DEFAULT_NEGATIVE_TTL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone)]
struct CacheEntry {
    data: Option<CatalogMetadata>,
    stored_at: Instant,
}

/// Cache occupancy snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub negative_entries: usize,
}

pub struct MetadataCache {
    entries: HashMap<String, CacheEntry>,
    positive_ttl: Duration,
    negative_ttl: Duration,
    max_entries: usize,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::with_ttls(DEFAULT_POSITIVE_TTL, DEFAULT_NEGATIVE_TTL)
    }

    pub fn with_ttls(positive_ttl: Duration, negative_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            positive_ttl,
            negative_ttl,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    fn ttl_for(&self, entry: &CacheEntry) -> Duration {
        if entry.data.is_none() {
            self.negative_ttl
        } else {
            self.positive_ttl
        }
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        entry.stored_at.elapsed() < self.ttl_for(entry)
    }

    /// Look up a key. `Some(None)` means a cached negative result, which is
    /// distinct from `None` (not cached at all). Expired entries are evicted
    /// on access.
    pub fn get(&mut self, key: &str) -> Option<Option<CatalogMetadata>> {
        match self.entries.get(key) {
            Some(entry) if self.is_fresh(entry) => Some(entry.data.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a lookup result, positive or negative.
    pub fn set(&mut self, key: &str, data: Option<CatalogMetadata>) {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(key) {
            self.clear_stale();
            if self.entries.len() >= self.max_entries {
                // Still full of fresh entries; drop an arbitrary one rather
                // than grow without bound.
                if let Some(victim) = self.entries.keys().next().cloned() {
                    self.entries.remove(&victim);
                }
            }
        }
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                data,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn clear_stale(&mut self) -> usize {
        let before = self.entries.len();
        let positive_ttl = self.positive_ttl;
        let negative_ttl = self.negative_ttl;
        self.entries.retain(|_, entry| {
            let ttl = if entry.data.is_none() {
                negative_ttl
            } else {
                positive_ttl
            };
            entry.stored_at.elapsed() < ttl
        });
        before - self.entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.entries.len(),
            negative_entries: self
                .entries
                .values()
                .filter(|e| e.data.is_none())
                .count(),
        }
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new()
    }
}
