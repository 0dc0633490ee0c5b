//! The dispatch engine (§4.D): for one request against one manifest,
//! produce the ordered lazy instruction cascade and return the first
//! instruction whose execution yields a response.

use std::time::Duration;

use futures::future::BoxFuture;
use tracing::warn;

use crate::cache::CacheStore;
use crate::instruction::Instruction;
use crate::manifest::Manifest;
use crate::network::NetworkFetcher;
use crate::request::{Request, Response};

/// Per-dispatch knobs. Not a configuration file (the manifest is the
/// only configuration channel, per the spec's non-goals) — just the
/// handful of values a single dispatch call needs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions {
    /// Upper bound on each per-group network fetch. `None` means no
    /// timeout is applied.
    pub timeout: Option<Duration>,
}

/// The external collaborators one dispatch call needs: a cache store
/// and a network fetcher. Borrowed for the duration of the call.
pub struct DispatchContext<'a> {
    /// The cache store backing every `FetchFromCache` instruction.
    pub cache: &'a dyn CacheStore,
    /// The network fetcher backing every `FetchFromNetwork` instruction.
    pub network: &'a dyn NetworkFetcher,
}

/// The result of one `dispatch` call: the response (if any instruction
/// yielded one) and the ordered list of instruction tags attempted,
/// for diagnostics (§6) and for tests asserting cascade order.
#[derive(Debug, Clone, Default)]
pub struct DispatchOutcome {
    /// The first response any instruction in the cascade yielded.
    pub response: Option<Response>,
    /// `describe()` of every instruction attempted, in execution order,
    /// across all recursive re-entries triggered by Fallback/Index.
    pub trace: Vec<String>,
}

/// Build the ordered instruction cascade for one request against one
/// manifest, per §4.D.
pub fn build_cascade(manifest: &Manifest, request: &Request, options: DispatchOptions) -> Vec<Instruction> {
    if manifest.metadata.dev {
        return vec![Instruction::FetchFromNetwork {
            request: request.clone(),
            timeout: options.timeout,
            force_refresh: false,
        }];
    }

    let mut cascade = Vec::with_capacity(1 + manifest.groups.len() * 3);

    cascade.push(Instruction::Index {
        request: request.clone(),
        index: manifest.metadata.index.clone(),
    });

    for group in manifest.groups.values() {
        cascade.push(Instruction::Fallback { request: request.clone(), group: group.clone() });
    }

    for group in manifest.groups.values() {
        cascade.push(Instruction::FetchFromCache {
            cache_name: group.cache_name(),
            request: request.clone(),
        });
    }

    for group in manifest.groups.values() {
        cascade.push(Instruction::FetchFromNetwork {
            request: request.clone(),
            timeout: options.timeout,
            force_refresh: false,
        });
    }

    cascade
}

/// Resolve one request against one manifest, executing the cascade
/// lazily and returning the first defined response. Recursion through
/// Fallback and Index instructions re-enters this same function with a
/// fresh cascade (§4.D) — boxed, since Rust cannot express unbounded
/// recursive `async fn` directly (§9, design note on reactive streams).
pub fn dispatch<'a>(
    ctx: &'a DispatchContext<'a>,
    manifest: &'a Manifest,
    request: Request,
    options: DispatchOptions,
) -> BoxFuture<'a, DispatchOutcome> {
    Box::pin(async move {
        let cascade = build_cascade(manifest, &request, options);
        let mut trace = Vec::with_capacity(cascade.len());

        for instruction in cascade {
            trace.push(instruction.describe());

            let response = match &instruction {
                Instruction::Fallback { request, group } => {
                    resolve_fallback(ctx, manifest, options, request, group, &mut trace).await
                }
                Instruction::Index { request, index } => {
                    resolve_index(ctx, manifest, options, request, index.as_deref(), &mut trace).await
                }
                _ => instruction.execute_leaf(ctx.cache, ctx.network).await,
            };

            if response.is_some() {
                return DispatchOutcome { response, trace };
            }
        }

        DispatchOutcome { response: None, trace }
    })
}

/// Resolve `raw` against `base`: absolute URLs are used as-is, bare
/// paths (the common manifest shape, e.g. `/index.html`) are resolved
/// relative to `base`'s origin.
fn resolve_target(base: &url::Url, raw: &str) -> Option<url::Url> {
    raw.parse::<url::Url>().ok().or_else(|| base.join(raw).ok())
}

async fn resolve_fallback<'a>(
    ctx: &'a DispatchContext<'a>,
    manifest: &'a Manifest,
    options: DispatchOptions,
    request: &Request,
    group: &crate::manifest::Group,
    trace: &mut Vec<String>,
) -> Option<Response> {
    for entry in group.fallback.values() {
        if !request.url.path().starts_with(entry.prefix.as_str()) {
            continue;
        }
        let Some(target) = resolve_target(&request.url, &entry.fallback_to) else {
            warn!(target: "ngsw", target = %entry.fallback_to, "fallback target is not a valid url");
            continue;
        };
        if target == request.url {
            warn!(
                target: "ngsw",
                group = %group.name,
                prefix = %entry.prefix,
                "fallback loop detected, suppressing"
            );
            continue;
        }
        let rewritten = request.with_url(target);
        let outcome = dispatch(ctx, manifest, rewritten, options).await;
        trace.extend(outcome.trace);
        if outcome.response.is_some() {
            return outcome.response;
        }
    }
    None
}

async fn resolve_index<'a>(
    ctx: &'a DispatchContext<'a>,
    manifest: &'a Manifest,
    options: DispatchOptions,
    request: &Request,
    index: Option<&str>,
    trace: &mut Vec<String>,
) -> Option<Response> {
    if request.url.path() != "/" {
        return None;
    }
    let Some(index) = index else {
        return None;
    };
    let Some(target) = resolve_target(&request.url, index) else {
        warn!(target: "ngsw", index, "index target is not a valid url");
        return None;
    };
    let rewritten = request.with_url(target);
    let outcome = dispatch(ctx, manifest, rewritten, options).await;
    trace.extend(outcome.trace);
    outcome.response
}
