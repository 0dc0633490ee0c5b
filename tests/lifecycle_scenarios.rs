//! End-to-end scenarios from `SPEC_FULL.md` §8, driving the public
//! `LifecycleController` API the way an embedder would rather than
//! reaching into its internals.

use std::sync::atomic::{AtomicUsize, Ordering};

use swcache_core::cache::InMemoryCacheStore;
use swcache_core::error::Result;
use swcache_core::lifecycle::{LifecycleController, WorkerOptions};
use swcache_core::network::NetworkFetcher;
use swcache_core::request::{Request, Response};
use swcache_core::{DispatchOptions, INSTALLING_CACHE};
use url::Url;

struct Body(&'static str);

#[async_trait::async_trait]
impl NetworkFetcher for Body {
    async fn request(&self, _req: &Request) -> Result<Response> {
        Ok(Response::new(self.0))
    }
    async fn refresh(&self, req: &Request) -> Result<Response> {
        self.request(req).await
    }
}

fn get(url: &str) -> Request {
    Request::get(Url::parse(url).unwrap())
}

/// Scenario 1 + 2: cold cache, install, then `/` is served from cache via
/// the index rewrite rather than re-fetched.
#[tokio::test]
async fn cold_cache_install_then_index_rewrite_served_from_cache() {
    let controller = LifecycleController::new(
        InMemoryCacheStore::new(),
        Body("INDEX"),
        WorkerOptions::default(),
    );

    controller
        .on_install(
            r#"{
                "metadata": { "index": "/index.html" },
                "groups": { "app": { "urls": { "/index.html": { "hash": "h1" } } } }
            }"#,
        )
        .await
        .unwrap();
    controller.on_activate().await.unwrap();

    let outcome = controller.on_fetch(get("http://example.test/")).await.unwrap();

    assert_eq!(outcome.response.unwrap().text(), "INDEX");
    let index_pos = outcome.trace.iter().position(|t| t.starts_with("index(")).unwrap();
    let cache_pos =
        outcome.trace.iter().position(|t| t.starts_with("fetchFromCache(")).unwrap();
    assert!(index_pos < cache_pos);
}

/// Scenario 3: a fallback rewrite lands on a cached index when the
/// original deep URL isn't itself cached.
#[tokio::test]
async fn fallback_rewrite_lands_on_cached_index() {
    let controller = LifecycleController::new(
        InMemoryCacheStore::new(),
        Body("INDEX"),
        WorkerOptions::default(),
    );

    controller
        .on_install(
            r#"{
                "groups": {
                    "app": {
                        "urls": { "/index.html": {} },
                        "fallback": { "/deep/": { "fallbackTo": "/index.html" } }
                    }
                }
            }"#,
        )
        .await
        .unwrap();
    controller.on_activate().await.unwrap();

    let outcome =
        controller.on_fetch(get("http://example.test/deep/unknown")).await.unwrap();

    assert_eq!(outcome.response.unwrap().text(), "INDEX");
}

/// Scenario 4: a silent network and a per-dispatch timeout bound how
/// long an unresolved fetch can block, regardless of group count.
#[tokio::test]
async fn network_timeout_bounds_dispatch_latency() {
    struct Silent;
    #[async_trait::async_trait]
    impl NetworkFetcher for Silent {
        async fn request(&self, _req: &Request) -> Result<Response> {
            std::future::pending().await
        }
        async fn refresh(&self, req: &Request) -> Result<Response> {
            self.request(req).await
        }
    }

    let controller = LifecycleController::new(
        InMemoryCacheStore::new(),
        Silent,
        WorkerOptions {
            dispatch: DispatchOptions { timeout: Some(std::time::Duration::from_millis(30)) },
        },
    );

    controller
        .on_install(r#"{ "groups": { "a": { "urls": { "/x": {} } }, "b": { "urls": { "/y": {} } } } }"#)
        .await
        .unwrap();
    controller.on_activate().await.unwrap();

    let started = std::time::Instant::now();
    let outcome =
        controller.on_fetch(get("http://example.test/missing")).await.unwrap();

    assert!(outcome.response.is_none());
    assert!(started.elapsed() < std::time::Duration::from_millis(500));
}

/// Scenario 5: dev bypass sends every fetch straight to the network,
/// never consulting a cache even when the URL is cached.
#[tokio::test]
async fn dev_bypass_skips_every_cache() {
    let cache = InMemoryCacheStore::new();
    let requests = std::sync::Arc::new(AtomicUsize::new(0));

    struct Counting(std::sync::Arc<AtomicUsize>);
    #[async_trait::async_trait]
    impl NetworkFetcher for Counting {
        async fn request(&self, _req: &Request) -> Result<Response> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Response::new("NET"))
        }
        async fn refresh(&self, req: &Request) -> Result<Response> {
            self.request(req).await
        }
    }

    let controller = LifecycleController::new(
        cache,
        Counting(requests.clone()),
        WorkerOptions::default(),
    );

    controller
        .on_install(
            r#"{
                "metadata": { "dev": true },
                "groups": { "app": { "urls": { "/index.html": {} } } }
            }"#,
        )
        .await
        .unwrap();
    controller.on_activate().await.unwrap();

    let outcome = controller.on_fetch(get("http://example.test/index.html")).await.unwrap();

    assert_eq!(outcome.response.unwrap().text(), "NET");
    assert_eq!(outcome.trace.len(), 1);
    assert_eq!(requests.load(Ordering::SeqCst), 1);
}

/// Scenario 6: cleanup on activate. A prior deployment's groups `{a, b}`
/// give way to `{a, c}`; only `cacheName(b)` is deleted.
#[tokio::test]
async fn activate_cleans_up_caches_for_dropped_groups_only() {
    let controller = LifecycleController::new(
        InMemoryCacheStore::new(),
        Body("X"),
        WorkerOptions::default(),
    );

    controller
        .on_install(
            r#"{ "groups": { "a": { "urls": { "/a": {} } }, "b": { "urls": { "/b": {} } } } }"#,
        )
        .await
        .unwrap();
    controller.on_activate().await.unwrap();

    controller
        .on_install(
            r#"{ "groups": { "a": { "urls": { "/a": {} } }, "c": { "urls": { "/c": {} } } } }"#,
        )
        .await
        .unwrap();
    controller.on_activate().await.unwrap();

    let keys = controller.cache().keys().await.unwrap();
    assert!(keys.contains("ngsw.active"));
    assert!(keys.contains("ngsw.cache.a"));
    assert!(keys.contains("ngsw.cache.c"));
    assert!(!keys.contains("ngsw.cache.b"));
    assert!(!keys.contains(INSTALLING_CACHE));
}

/// An install whose manifest text is byte-identical to what's already
/// active performs no prefetch at all (the `changed = false` fast path).
#[tokio::test]
async fn reinstalling_identical_manifest_text_skips_prefetch() {
    struct Counting(std::sync::Arc<AtomicUsize>);
    #[async_trait::async_trait]
    impl NetworkFetcher for Counting {
        async fn request(&self, _req: &Request) -> Result<Response> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Response::new("X"))
        }
        async fn refresh(&self, req: &Request) -> Result<Response> {
            self.request(req).await
        }
    }

    let text = r#"{ "groups": { "app": { "urls": { "/index.html": {} } } } }"#;
    let requests = std::sync::Arc::new(AtomicUsize::new(0));
    let controller = LifecycleController::new(
        InMemoryCacheStore::new(),
        Counting(requests.clone()),
        WorkerOptions::default(),
    );

    controller.on_install(text).await.unwrap();
    controller.on_activate().await.unwrap();
    controller.on_install(text).await.unwrap();

    assert_eq!(requests.load(Ordering::SeqCst), 1);
}

/// A fallback target equal to the request URL is suppressed as a loop
/// rather than recursing forever.
#[tokio::test]
async fn fallback_loop_is_suppressed_not_recursed() {
    let controller = LifecycleController::new(
        InMemoryCacheStore::new(),
        Body("X"),
        WorkerOptions::default(),
    );

    controller
        .on_install(
            r#"{
                "groups": {
                    "app": {
                        "urls": {},
                        "fallback": { "/deep/": { "fallbackTo": "/deep/loop" } }
                    }
                }
            }"#,
        )
        .await
        .unwrap();
    controller.on_activate().await.unwrap();

    let outcome =
        controller.on_fetch(get("http://example.test/deep/loop")).await.unwrap();

    assert!(outcome.response.is_none());
}
