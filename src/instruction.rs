//! The instruction set (§4.C): small value objects describing one
//! atomic attempt at resolving a request. Instructions are pure
//! description — a closed `enum`, mirroring the way the http-cache
//! core models "what to do next" as `Action`/`Fetch`/`Stage` rather
//! than trait objects, since the four kinds here are fixed and known
//! entirely within this crate.

use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::manifest::Group;
use crate::network::NetworkFetcher;
use crate::request::{Request, Response};

/// One atomic resolution attempt produced by the dispatch engine.
#[derive(Debug, Clone)]
pub enum Instruction {
    /// Consult a named cache for the request's URL.
    FetchFromCache {
        /// The cache to consult.
        cache_name: String,
        /// The request being resolved.
        request: Request,
    },
    /// Issue a network fetch for the request.
    FetchFromNetwork {
        /// The request being resolved.
        request: Request,
        /// Abandon the in-flight fetch after this long and yield
        /// nothing, letting the cascade continue.
        timeout: Option<Duration>,
        /// Force a revalidation/no-store request instead of a normal one.
        force_refresh: bool,
    },
    /// Try rewriting the request to one of a group's fallback targets.
    Fallback {
        /// The request being resolved.
        request: Request,
        /// The group whose fallback rules are being tried.
        group: Group,
    },
    /// Rewrite `/` to the manifest's configured index URL.
    Index {
        /// The request being resolved.
        request: Request,
        /// `metadata.index`, if the active manifest set one.
        index: Option<String>,
    },
}

impl Instruction {
    /// A human-readable diagnostic tag, logged under the `ngsw` target
    /// for every instruction the dispatcher attempts (§6, Diagnostics).
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Instruction::FetchFromCache { cache_name, request } => {
                format!("fetchFromCache({cache_name}, {})", request.url)
            }
            Instruction::FetchFromNetwork { request, .. } => {
                format!("fetchFromNetwork({})", request.url)
            }
            Instruction::Fallback { request, group } => {
                format!("fallback({}, {})", group.name, request.url)
            }
            Instruction::Index { request, index } => {
                format!(
                    "index({}, {})",
                    request.url,
                    index.as_deref().unwrap_or("<none>")
                )
            }
        }
    }

    /// Execute a leaf instruction (`FetchFromCache` or
    /// `FetchFromNetwork`), which never recurse into dispatch. Returns
    /// `None` on a cache miss or any network error — never fails the
    /// whole dispatch (§7: "not an error").
    ///
    /// `Fallback` and `Index` are executed by the dispatch engine
    /// itself, since resolving them means re-entering `dispatch` (§4.D,
    /// §9 "a handle back to the dispatcher") rather than a self-contained
    /// cache or network call.
    pub async fn execute_leaf(
        &self,
        cache: &dyn CacheStore,
        network: &dyn NetworkFetcher,
    ) -> Option<Response> {
        debug!(target: "ngsw", instruction = %self.describe(), "executing instruction");
        match self {
            Instruction::FetchFromCache { cache_name, request } => {
                match cache.load(cache_name, request.url.path()).await {
                    Ok(response) => response,
                    Err(err) => {
                        warn!(target: "ngsw", %err, "cache load failed, treating as miss");
                        None
                    }
                }
            }
            Instruction::FetchFromNetwork { request, timeout, force_refresh } => {
                let fetch = async {
                    if *force_refresh {
                        network.refresh(request).await
                    } else {
                        network.request(request).await
                    }
                };
                let result = match timeout {
                    Some(duration) => match tokio::time::timeout(*duration, fetch).await {
                        Ok(result) => result,
                        Err(_elapsed) => {
                            warn!(target: "ngsw", url = %request.url, "network fetch timed out");
                            return None;
                        }
                    },
                    None => fetch.await,
                };
                match result {
                    Ok(response) => Some(response),
                    Err(err) => {
                        warn!(target: "ngsw", %err, "network fetch failed");
                        None
                    }
                }
            }
            Instruction::Fallback { .. } | Instruction::Index { .. } => {
                unreachable!("Fallback and Index are resolved by the dispatch engine")
            }
        }
    }
}
