//! The network fetcher abstraction (§6, "Network fetcher (consumed)").
//!
//! The low-level network fetcher is out of scope for this crate: an
//! embedder wires `fetch()` (browser) or a real HTTP client through
//! this trait. This crate only defines the two operations dispatch and
//! install need.

use crate::error::Result;
use crate::request::{Request, Response};

/// Performs the actual network I/O the engine never does itself.
#[async_trait::async_trait]
pub trait NetworkFetcher: Send + Sync {
    /// A normal request, with the platform's HTTP cache participating.
    async fn request(&self, req: &Request) -> Result<Response>;

    /// A forced revalidation / no-store request, used when
    /// `bypass_http_cache` is set on the request.
    async fn refresh(&self, req: &Request) -> Result<Response>;
}
