//! A minimal request/response abstraction, standing in for the host
//! runtime's native `Request`/`Response` types (out of scope; see
//! `SPEC_FULL.md` §6).

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use url::Url;

/// A request the engine is trying to resolve.
///
/// Cloning and overriding the URL (`with_url`) is the Rust analogue of
/// the host's `newRequest(original, { url })` adapter.
#[derive(Debug, Clone)]
pub struct Request {
    /// The request method. Only `GET`/`HEAD` are ever cacheable, but
    /// the engine does not reject other methods itself.
    pub method: Method,
    /// The request URL.
    pub url: Url,
    /// Request headers, carried through rewrites unchanged.
    pub headers: HeaderMap,
    /// Set when this request must bypass the platform's HTTP cache,
    /// i.e. a forced revalidation (`FetchFromNetwork`'s `bypassHttpCache`).
    pub bypass_http_cache: bool,
}

impl Request {
    /// Build a new GET request for `url`.
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            bypass_http_cache: false,
        }
    }

    /// Clone this request with its URL replaced, leaving method,
    /// headers, and cache-bypass flag untouched. Used by the Index and
    /// Fallback instructions to rewrite a request before re-entering
    /// dispatch.
    #[must_use]
    pub fn with_url(&self, url: Url) -> Self {
        Self { url, ..self.clone() }
    }

    /// Clone this request with the HTTP-cache bypass flag set.
    #[must_use]
    pub fn bypassing_http_cache(&self) -> Self {
        Self { bypass_http_cache: true, ..self.clone() }
    }
}

/// A response the engine can serve, either from a cache or the network.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl Response {
    /// Synthesize a response from a body, defaulting to `200 OK`.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self { status: StatusCode::OK, headers: HeaderMap::new(), body: body.into() }
    }

    /// Whether the response represents success. Mirrors the host
    /// `Response.ok` boolean: true for any `2xx` status.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Extract the body as UTF-8 text, lossily replacing invalid
    /// sequences rather than failing — downstream code must tolerate a
    /// missing or malformed body (§9, "error body extraction").
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
