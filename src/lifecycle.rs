//! The lifecycle controller (§4.E): reacts to `install`, `activate`,
//! and `fetch` host events, driving diff-and-prefetch on install,
//! cache cleanup on activate, and dispatch on fetch.
//!
//! The in-memory manifest is the "single cell whose writes are
//! confined to the lifecycle controller" design note (§9): it lives
//! behind a [`tokio::sync::RwLock`], written only by [`LifecycleController::on_install`]
//! and [`LifecycleController::on_activate`], read by [`LifecycleController::on_fetch`].

use tokio::sync::RwLock;
use tracing::info;

use crate::cache::{CacheStore, ACTIVE_CACHE, INSTALLING_CACHE, MANIFEST_URL};
use crate::dispatch::{dispatch, DispatchContext, DispatchOptions, DispatchOutcome};
use crate::error::{Error, Result};
use crate::manifest::{self, Manifest, ManifestDelta, ManifestSnapshot};
use crate::network::NetworkFetcher;
use crate::request::{Request, Response};

/// Per-worker knobs. The manifest is the only *content* configuration
/// channel (per the spec's non-goals on runtime reconfiguration); this
/// is just the handful of values the controller itself needs, mirroring
/// the teacher's struct-of-knobs style (`CacheOptions`, `HttpCache<T>`)
/// rather than a config file.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerOptions {
    /// Forwarded to every dispatch as [`DispatchOptions::timeout`].
    pub dispatch: DispatchOptions,
}

/// The lifecycle state machine (§4.E "Lifecycle state machine").
#[derive(Debug, Clone)]
enum WorkerState {
    /// No manifest has been loaded yet; fetches fall through.
    Uninitialized,
    /// `M` is authoritative for dispatch.
    Active(ManifestSnapshot),
    /// `new` is being prefetched; `active`, if any, still serves traffic.
    Installing { new: ManifestSnapshot, active: Option<ManifestSnapshot> },
    /// `new` has finished prefetching and is being promoted; transient
    /// for the duration of [`LifecycleController::on_activate`].
    Activating(ManifestSnapshot),
}

/// Reacts to the three host lifecycle events and owns the worker's
/// current view of the world.
///
/// Generic over the two external collaborators this crate never
/// implements itself (§1 "OUT OF SCOPE"): the cache store and the
/// network fetcher.
pub struct LifecycleController<C: CacheStore, N: NetworkFetcher> {
    cache: C,
    network: N,
    options: WorkerOptions,
    state: RwLock<WorkerState>,
}

impl<C: CacheStore, N: NetworkFetcher> LifecycleController<C, N> {
    /// Build a controller with no manifest loaded yet.
    pub fn new(cache: C, network: N, options: WorkerOptions) -> Self {
        Self { cache, network, options, state: RwLock::new(WorkerState::Uninitialized) }
    }

    /// The cache store this controller was built with, for embedders
    /// that need to reach it directly (e.g. to seed `ngsw.active` in tests).
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// `install` event (§4.E): diff the fresh manifest against whatever
    /// is currently active, prefetch the delta, and stage the result in
    /// `ngsw.installing`. Any error aborts the installation and leaves
    /// the previous active state untouched (§7).
    pub async fn on_install(&self, manifest_text: &str) -> Result<()> {
        info!(target: "ngsw", "install:start");

        let fresh = manifest::parse(manifest_text)?;
        let previous_active = match &*self.state.read().await {
            WorkerState::Active(snapshot) => Some(snapshot.clone()),
            WorkerState::Installing { active, .. } => active.clone(),
            _ => None,
        };

        let delta = manifest::diff(&fresh, previous_active.as_ref());
        self.prefetch(&delta).await?;

        self.cache
            .store(INSTALLING_CACHE, MANIFEST_URL, Response::new(fresh.text.clone()))
            .await
            .map_err(Error::cache_store)?;

        *self.state.write().await =
            WorkerState::Installing { new: fresh, active: previous_active };

        info!(target: "ngsw", "install:complete");
        Ok(())
    }

    /// Fetch every added URL, per group, into that group's cache. An
    /// error from any fetch or store aborts the whole install (§4.E:
    /// "Any error aborts the installation").
    async fn prefetch(&self, delta: &ManifestDelta) -> Result<()> {
        for (group_name, group_delta) in &delta.per_group {
            if group_delta.added.is_empty() {
                continue;
            }
            let cache_name = delta
                .current
                .cache_name(group_name)
                .ok_or(Error::UnknownManifestSource("group not in fresh manifest"))?;
            for url in &group_delta.added {
                let target = manifest::local_url(url)?;
                let request = Request::get(target);
                let response = self
                    .network
                    .request(&request)
                    .await
                    .map_err(Error::network)?;
                if !response.ok() {
                    return Err(Error::ManifestUnavailable);
                }
                self.cache
                    .store(&cache_name, url, response)
                    .await
                    .map_err(Error::cache_store)?;
            }
        }
        Ok(())
    }

    /// `activate` event (§4.E): diff `ngsw.installing` against
    /// `ngsw.active`, delete every cache that backs neither reserved
    /// name nor a group of the new manifest, then promote the staged
    /// manifest text to `ngsw.active`.
    pub async fn on_activate(&self) -> Result<()> {
        info!(target: "ngsw", "activate:start");

        let new = {
            let state = self.state.read().await;
            match &*state {
                WorkerState::Installing { new, .. } => new.clone(),
                WorkerState::Active(snapshot) => snapshot.clone(),
                WorkerState::Activating(snapshot) => snapshot.clone(),
                WorkerState::Uninitialized => {
                    return Err(Error::UnknownManifestSource(
                        "activate with nothing installing",
                    ))
                }
            }
        };

        *self.state.write().await = WorkerState::Activating(new.clone());

        self.cleanup_stale_caches(&new.manifest).await?;

        self.cache
            .store(ACTIVE_CACHE, MANIFEST_URL, Response::new(new.text.clone()))
            .await
            .map_err(Error::cache_store)?;
        self.cache.remove(INSTALLING_CACHE).await.map_err(Error::cache_store)?;

        *self.state.write().await = WorkerState::Active(new);

        info!(target: "ngsw", "activate:complete");
        Ok(())
    }

    /// Delete every cache whose name is not one of the two reserved
    /// names and not `cacheName(g)` for any group of `manifest`
    /// (Invariant 4).
    async fn cleanup_stale_caches(&self, manifest: &Manifest) -> Result<()> {
        let keep: std::collections::HashSet<String> = manifest
            .groups
            .values()
            .map(|group| group.cache_name())
            .chain([ACTIVE_CACHE.to_string(), INSTALLING_CACHE.to_string()])
            .collect();

        let existing = self.cache.keys().await.map_err(Error::cache_store)?;
        for cache_name in existing {
            if !keep.contains(&cache_name) {
                self.cache.remove(&cache_name).await.map_err(Error::cache_store)?;
            }
        }
        Ok(())
    }

    /// `fetch` event (§4.E): lazily load the active manifest from
    /// `ngsw.active` on the first fetch after a cold start, then
    /// dispatch the request through the serving manifest.
    pub async fn on_fetch(&self, request: Request) -> Result<DispatchOutcome> {
        self.ensure_initialized().await?;

        let serving = match &*self.state.read().await {
            WorkerState::Active(snapshot) => Some(snapshot.manifest.clone()),
            WorkerState::Installing { active, .. } => {
                active.as_ref().map(|snapshot| snapshot.manifest.clone())
            }
            WorkerState::Activating(snapshot) => Some(snapshot.manifest.clone()),
            WorkerState::Uninitialized => None,
        };

        let Some(manifest) = serving else {
            return Ok(DispatchOutcome::default());
        };

        let ctx = DispatchContext { cache: &self.cache, network: &self.network };
        Ok(dispatch(&ctx, &manifest, request, self.options.dispatch).await)
    }

    async fn ensure_initialized(&self) -> Result<()> {
        if !matches!(&*self.state.read().await, WorkerState::Uninitialized) {
            return Ok(());
        }
        let Some(stored) = self
            .cache
            .load(ACTIVE_CACHE, MANIFEST_URL)
            .await
            .map_err(Error::cache_store)?
        else {
            return Ok(());
        };
        let snapshot = manifest::parse(&stored.text())?;
        *self.state.write().await = WorkerState::Active(snapshot);
        info!(target: "ngsw", "fetch:cold-start");
        Ok(())
    }
}
