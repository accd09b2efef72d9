//! External catalog metadata capability.
//!
//! The ingestion core never calls this; it exists for the analytics layer
//! that enriches dimension entities with images and genres. The actual
//! catalog client (authentication, search, batching) lives behind the
//! [`MetadataSource`] trait; this module provides the contract and a
//! caching decorator.

mod cache;

pub use cache::{CacheStats, MetadataCache};

use crate::etl::ContentKind;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;

/// Metadata the catalog can attach to a dimension entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogMetadata {
    pub image_url: Option<String>,
    pub genres: Vec<String>,
}

/// A capability that maps a name or URI to optional catalog metadata.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// `Ok(None)` means the catalog has nothing for this key, which is a
    /// valid, cacheable answer.
    async fn lookup(&self, kind: ContentKind, key: &str) -> Result<Option<CatalogMetadata>>;
}

/// Decorates a [`MetadataSource`] with a [`MetadataCache`]. Both hits and
/// misses are cached; only errors bypass the cache.
pub struct CachedMetadataSource<S> {
    inner: S,
    cache: Mutex<MetadataCache>,
}

impl<S: MetadataSource> CachedMetadataSource<S> {
    pub fn new(inner: S, cache: MetadataCache) -> Self {
        Self {
            inner,
            cache: Mutex::new(cache),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().unwrap().stats()
    }

    /// Drop expired cache entries. Returns how many were removed.
    pub fn clear_stale(&self) -> usize {
        self.cache.lock().unwrap().clear_stale()
    }
}

#[async_trait]
impl<S: MetadataSource> MetadataSource for CachedMetadataSource<S> {
    async fn lookup(&self, kind: ContentKind, key: &str) -> Result<Option<CatalogMetadata>> {
        let cache_key = format!("{}:{}", kind.as_str(), key);

        if let Some(cached) = self.cache.lock().unwrap().get(&cache_key) {
            return Ok(cached);
        }

        let result = self.inner.lookup(kind, key).await?;
        self.cache.lock().unwrap().set(&cache_key, result.clone());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source that counts lookups and knows a single key.
    struct FakeSource {
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MetadataSource for FakeSource {
        async fn lookup(
            &self,
            _kind: ContentKind,
            key: &str,
        ) -> Result<Option<CatalogMetadata>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if key == "spotify:track:known" {
                Ok(Some(CatalogMetadata {
                    image_url: Some("http://img".to_string()),
                    genres: vec!["jazz".to_string()],
                }))
            } else {
                Ok(None)
            }
        }
    }

    #[tokio::test]
    async fn test_second_lookup_is_served_from_cache() {
        let source = CachedMetadataSource::new(FakeSource::new(), MetadataCache::new());

        let first = source
            .lookup(ContentKind::Track, "spotify:track:known")
            .await
            .unwrap();
        let second = source
            .lookup(ContentKind::Track, "spotify:track:known")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert!(first.is_some());
        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_negative_results_are_cached() {
        let source = CachedMetadataSource::new(FakeSource::new(), MetadataCache::new());

        let first = source
            .lookup(ContentKind::Track, "spotify:track:unknown")
            .await
            .unwrap();
        let second = source
            .lookup(ContentKind::Track, "spotify:track:unknown")
            .await
            .unwrap();

        assert_eq!(first, None);
        assert_eq!(second, None);
        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.cache_stats().negative_entries, 1);
    }

    #[tokio::test]
    async fn test_kind_is_part_of_the_cache_key() {
        let source = CachedMetadataSource::new(FakeSource::new(), MetadataCache::new());

        source
            .lookup(ContentKind::Track, "some-key")
            .await
            .unwrap();
        source
            .lookup(ContentKind::Episode, "some-key")
            .await
            .unwrap();

        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(source.cache_stats().total_entries, 2);
    }
}
