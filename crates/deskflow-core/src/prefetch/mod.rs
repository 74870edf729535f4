// ── Prefetch scheduler ──
//
// Warms the query cache ahead of navigation. Two triggers:
//
// - route changes, debounced: only the last path of a burst is prefetched
// - hovers, throttled per resource: one pending timer at a time
//
// Prefetching is best effort. Errors end up in the cache entry and a debug
// log line, never with the caller.

mod routes;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::PrefetchConfig;
use crate::model::{Resource, Rows};
use crate::source::{DataSource, collection_loader};
use crate::store::{FetchOptions, QueryCache};

pub use routes::RouteTable;

#[derive(Default)]
struct RouteState {
    last_path: Option<String>,
    pending: Option<CancellationToken>,
}

struct PrefetchInner {
    cache: QueryCache<Rows>,
    source: Arc<dyn DataSource>,
    routes: RouteTable,
    config: PrefetchConfig,
    options: FetchOptions,
    shutdown: CancellationToken,
    route: Mutex<RouteState>,
    /// Pending hover timers, by resource, tagged with a trigger id.
    hover: Mutex<HashMap<Resource, u64>>,
    next_trigger: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PrefetchInner {
    /// Fetch `resource` unless the cache already holds fresh data for it.
    async fn prefetch_one(&self, resource: Resource) {
        let key = resource.key();
        if self.cache.is_fresh(&key) {
            trace!(resource = %resource, "prefetch skipped, data fresh");
            return;
        }
        let loader = collection_loader(Arc::clone(&self.source), resource);
        match self.cache.fetch_with(&key, loader, self.options).await {
            Ok(rows) => trace!(resource = %resource, rows = rows.len(), "prefetched"),
            Err(e) => debug!(resource = %resource, error = %e, "prefetch failed"),
        }
    }

    async fn prefetch_all(&self, resources: &[Resource]) {
        join_all(resources.iter().map(|r| self.prefetch_one(*r))).await;
    }
}

/// Debounced/throttled cache warmer. Dropping it cancels pending timers.
pub struct PrefetchScheduler {
    inner: Arc<PrefetchInner>,
}

impl PrefetchScheduler {
    pub fn new(
        cache: QueryCache<Rows>,
        source: Arc<dyn DataSource>,
        config: PrefetchConfig,
        options: FetchOptions,
    ) -> Self {
        Self::with_routes(cache, source, config, options, RouteTable::default())
    }

    pub fn with_routes(
        cache: QueryCache<Rows>,
        source: Arc<dyn DataSource>,
        config: PrefetchConfig,
        options: FetchOptions,
        routes: RouteTable,
    ) -> Self {
        Self {
            inner: Arc::new(PrefetchInner {
                cache,
                source,
                routes,
                config,
                options,
                shutdown: CancellationToken::new(),
                route: Mutex::new(RouteState::default()),
                hover: Mutex::new(HashMap::new()),
                next_trigger: AtomicU64::new(0),
            }),
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.inner.routes
    }

    // ── Route trigger ────────────────────────────────────────────────

    /// Note a navigation to `path`.
    ///
    /// A repeat of the previous path is ignored. Otherwise any pending
    /// route timer is replaced, and once the debounce window passes without
    /// another change the route's stale or missing resources are fetched.
    pub fn route_changed(&self, path: &str) {
        let (resources, timer) = {
            let mut route = lock(&self.inner.route);
            if route.last_path.as_deref() == Some(path) {
                trace!(path, "same route, prefetch skipped");
                return;
            }
            route.last_path = Some(path.to_owned());
            if let Some(previous) = route.pending.take() {
                trace!(path, "route timer reset");
                previous.cancel();
            }

            let resources = self.inner.routes.resources_for(path).to_vec();
            if resources.is_empty() {
                trace!(path, "route needs no data");
                return;
            }
            let timer = self.inner.shutdown.child_token();
            route.pending = Some(timer.clone());
            (resources, timer)
        };

        let inner = Arc::clone(&self.inner);
        let delay = inner.config.route_debounce;
        let path = path.to_owned();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = timer.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            debug!(path = %path, ?resources, "route prefetch");
            inner.prefetch_all(&resources).await;
        });
    }

    /// Prefetch a route's resources right away, bypassing the debounce.
    /// Returns the resources that were considered.
    pub async fn prefetch_route(&self, path: &str) -> Vec<Resource> {
        let resources = self.inner.routes.resources_for(path).to_vec();
        self.inner.prefetch_all(&resources).await;
        resources
    }

    // ── Hover trigger ────────────────────────────────────────────────

    /// Note a hover over a link to `resource`.
    ///
    /// Ignored while a hover timer for the same resource is pending; when
    /// the timer fires the cache is checked and a fetch issued if needed.
    pub fn prefetch(&self, resource: Resource) {
        let trigger = self.inner.next_trigger.fetch_add(1, Ordering::Relaxed);
        {
            let mut pending = lock(&self.inner.hover);
            if pending.contains_key(&resource) {
                trace!(resource = %resource, "hover prefetch throttled");
                return;
            }
            pending.insert(resource, trigger);
        }

        let inner = Arc::clone(&self.inner);
        let timer = inner.shutdown.child_token();
        let delay = inner.config.hover_throttle;
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = timer.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            {
                let mut pending = lock(&inner.hover);
                if pending.get(&resource) == Some(&trigger) {
                    pending.remove(&resource);
                }
            }
            inner.prefetch_one(resource).await;
        });
    }

    pub fn prefetch_clients(&self) {
        self.prefetch(Resource::Clients);
    }

    pub fn prefetch_tickets(&self) {
        self.prefetch(Resource::Tickets);
    }

    pub fn prefetch_technicians(&self) {
        self.prefetch(Resource::Technicians);
    }

    pub fn prefetch_articles(&self) {
        self.prefetch(Resource::Articles);
    }

    pub fn prefetch_categories(&self) {
        self.prefetch(Resource::Categories);
    }

    // ── Teardown ─────────────────────────────────────────────────────

    /// Cancel every pending timer. Later triggers are ignored.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        lock(&self.inner.hover).clear();
        lock(&self.inner.route).pending = None;
        debug!("prefetch scheduler stopped");
    }
}

impl Drop for PrefetchScheduler {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}
