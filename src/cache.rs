//! The named-cache abstraction over the host's content store (§4.B),
//! plus an in-process reference implementation used by this crate's
//! own tests and by embedders during development.

use std::collections::HashSet;

use dashmap::DashMap;
use moka::future::Cache as MokaCache;

use crate::error::Result;
use crate::request::Response;

/// Reserved cache name holding the live, serving manifest.
pub const ACTIVE_CACHE: &str = "ngsw.active";
/// Reserved cache name holding the staged, installing manifest.
pub const INSTALLING_CACHE: &str = "ngsw.installing";
/// URL every cache stores its manifest text under.
pub const MANIFEST_URL: &str = "/manifest.appcache";

/// Named-cache storage, consumed by the dispatch engine and lifecycle
/// controller. An embedder backs this with the host's actual cache
/// storage (e.g. the browser Cache Storage API); this crate never
/// assumes a particular backend.
///
/// `load` never errors on a missing cache — a cache that doesn't exist
/// yet is indistinguishable from one that exists but misses the URL.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a stored response. Returns `Ok(None)` on a miss,
    /// including when `cache_name` itself has never been created.
    async fn load(&self, cache_name: &str, url: &str) -> Result<Option<Response>>;

    /// Store a response under `url`, creating `cache_name` on demand.
    /// Overwrites any prior value for that URL.
    async fn store(&self, cache_name: &str, url: &str, response: Response) -> Result<()>;

    /// List every cache name this store has created.
    async fn keys(&self) -> Result<HashSet<String>>;

    /// Delete a cache and everything in it. A no-op if it doesn't exist.
    async fn remove(&self, cache_name: &str) -> Result<()>;
}

/// An in-memory [`CacheStore`], backed by one [`MokaCache`] per named
/// cache. Not meant as a production backend — a real embedder wires
/// the browser's Cache Storage API through [`CacheStore`] instead —
/// but it lets the dispatch and lifecycle logic run against a real
/// async store in this crate's own tests rather than a hand-mocked
/// trait object every time.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCacheStore {
    caches: DashMap<String, MokaCache<String, Response>>,
}

impl InMemoryCacheStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn cache_for(&self, cache_name: &str) -> MokaCache<String, Response> {
        self.caches
            .entry(cache_name.to_string())
            .or_insert_with(|| MokaCache::builder().build())
            .clone()
    }
}

#[async_trait::async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn load(&self, cache_name: &str, url: &str) -> Result<Option<Response>> {
        let Some(cache) = self.caches.get(cache_name) else {
            return Ok(None);
        };
        Ok(cache.get(url).await)
    }

    async fn store(&self, cache_name: &str, url: &str, response: Response) -> Result<()> {
        let cache = self.cache_for(cache_name);
        cache.insert(url.to_string(), response).await;
        Ok(())
    }

    async fn keys(&self) -> Result<HashSet<String>> {
        Ok(self.caches.iter().map(|entry| entry.key().clone()).collect())
    }

    async fn remove(&self, cache_name: &str) -> Result<()> {
        self.caches.remove(cache_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_cache_is_a_miss_not_an_error() {
        let store = InMemoryCacheStore::new();
        let result = store.load("ngsw.cache.app", "/index.html").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn store_then_load_round_trips() {
        let store = InMemoryCacheStore::new();
        store
            .store("ngsw.cache.app", "/index.html", Response::new("INDEX"))
            .await
            .unwrap();
        let loaded =
            store.load("ngsw.cache.app", "/index.html").await.unwrap().unwrap();
        assert_eq!(loaded.text(), "INDEX");
    }

    #[tokio::test]
    async fn remove_is_a_no_op_on_absent_cache() {
        let store = InMemoryCacheStore::new();
        store.remove("ngsw.cache.nonexistent").await.unwrap();
    }

    #[tokio::test]
    async fn keys_lists_only_created_caches() {
        let store = InMemoryCacheStore::new();
        store
            .store("ngsw.cache.a", "/a", Response::new("A"))
            .await
            .unwrap();
        let keys = store.keys().await.unwrap();
        assert_eq!(keys, HashSet::from(["ngsw.cache.a".to_string()]));
    }
}
