#![forbid(unsafe_code, future_incompatible)]
#![deny(
    missing_docs,
    missing_debug_implementations,
    nonstandard_style,
    unused_qualifications,
    unused_import_braces,
    unused_extern_crates,
    trivial_casts,
    trivial_numeric_casts
)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! The control core of a browser-resident offline asset cache, meant
//! to run inside a service-worker runtime.
//!
//! This crate owns two things: a **dispatch engine** that resolves one
//! network request against a versioned manifest of asset groups by
//! walking an ordered cascade of [`Instruction`]s (dev bypass → index
//! rewrite → fallback rewrite → cache lookup → network), and a
//! **lifecycle controller** that drives that manifest's install /
//! activate / fetch lifecycle across deployments so that old asset
//! versions are retired only after a new version has fully prefetched.
//!
//! The raw browser cache storage and the low-level network fetcher are
//! out of scope; an embedder implements [`CacheStore`] and
//! [`NetworkFetcher`] against the host runtime (the browser Cache
//! Storage API and `fetch`, respectively) and hands both to a
//! [`LifecycleController`].
//!
//! ```no_run
//! use swcache_core::{
//!     cache::InMemoryCacheStore, lifecycle::{LifecycleController, WorkerOptions},
//! };
//! # use swcache_core::{error::Result, network::NetworkFetcher, request::{Request, Response}};
//! # struct Fetcher;
//! # #[async_trait::async_trait]
//! # impl NetworkFetcher for Fetcher {
//! #     async fn request(&self, _req: &Request) -> Result<Response> { Ok(Response::new("")) }
//! #     async fn refresh(&self, req: &Request) -> Result<Response> { self.request(req).await }
//! # }
//! # async fn run() -> Result<()> {
//! let controller = LifecycleController::new(
//!     InMemoryCacheStore::new(),
//!     Fetcher,
//!     WorkerOptions::default(),
//! );
//! controller.on_install(r#"{"groups":{"app":{"urls":{"/index.html":{}}}}}"#).await?;
//! controller.on_activate().await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod dispatch;
pub mod error;
pub mod instruction;
pub mod lifecycle;
pub mod manifest;
pub mod network;
pub mod request;

pub use cache::{CacheStore, ACTIVE_CACHE, INSTALLING_CACHE, MANIFEST_URL};
pub use dispatch::{dispatch, DispatchContext, DispatchOptions, DispatchOutcome};
pub use error::{Error, Result};
pub use instruction::Instruction;
pub use lifecycle::{LifecycleController, WorkerOptions};
pub use manifest::{
    diff, parse, serialize, Entry, FallbackEntry, Group, Manifest, ManifestDelta,
    ManifestSnapshot, Metadata,
};
pub use network::NetworkFetcher;
pub use request::{Request, Response};
