//! Error types for the worker core.

use thiserror::Error;

/// A `Result` typedef to use with the crate's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while parsing a manifest, dispatching a
/// request, or driving the install/activate lifecycle.
#[derive(Debug, Error)]
pub enum Error {
    /// The manifest text could not be parsed into a [`crate::manifest::Manifest`].
    #[error("failed to parse manifest: {0}")]
    ManifestParse(#[from] serde_json::Error),

    /// A URL embedded in the manifest or a request did not parse.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The underlying [`crate::cache::CacheStore`] failed.
    #[error("cache store error: {0}")]
    CacheStore(Box<dyn std::error::Error + Send + Sync>),

    /// The underlying [`crate::network::NetworkFetcher`] failed.
    #[error("network fetch error: {0}")]
    Network(Box<dyn std::error::Error + Send + Sync>),

    /// An install event could not produce a fresh manifest because the
    /// network response was missing or not `ok`.
    #[error("fresh manifest unavailable")]
    ManifestUnavailable,

    /// An internal diff request named a manifest source the lifecycle
    /// controller does not recognize. This is a programmer error: it
    /// can only happen if this crate's own state machine is wired
    /// incorrectly, never from untrusted input.
    #[error("unknown manifest source: {0}")]
    UnknownManifestSource(&'static str),

    /// A header or request part failed to convert between representations.
    #[error("malformed header: {0}")]
    BadHeader(#[from] http::header::InvalidHeaderValue),
}

impl Error {
    /// Wrap an opaque [`crate::cache::CacheStore`] error.
    pub fn cache_store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::CacheStore(Box::new(err))
    }

    /// Wrap an opaque [`crate::network::NetworkFetcher`] error.
    pub fn network<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network(Box::new(err))
    }
}
