// ── Query cache ──
//
// Keyed cache of fetched collections. Each key has at most one fetch in
// flight; every caller that arrives while it runs awaits the same shared
// future. Fetches run on their own task so a caller dropping its future
// never cancels the request for everyone else.
//
// Ordering: a cache-wide clock ticks on every fetch start, local write, and
// invalidation. A fetch only stores its result if no local write happened
// after it started, and leaves the entry stale if an invalidation did. A
// result dropped in favor of a local write still marks the entry stale: the
// server may hold rows the local write never saw.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::entry::{CacheEntry, EntrySnapshot, FetchOptions, InFlight, QueryStatus};
use super::key::QueryKey;
use super::observer::QueryObserver;
use super::retry::{RetryPolicy, retry_with};
use crate::error::CoreError;

/// A reusable, zero-argument async producer of a key's data.
pub type Loader<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, CoreError>> + Send + Sync>;

pub(crate) type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, CoreError>>>;

/// Box a closure into a [`Loader`].
pub fn loader<T, F, Fut>(f: F) -> Loader<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, CoreError>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// How `invalidate` treats keys that currently have observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidateMode {
    /// Refetch observed keys right away.
    ActiveOnly,
    /// Only mark stale; the next `fetch` refetches.
    None,
}

// ── QueryCache ───────────────────────────────────────────────────────

/// Cheaply cloneable handle; clones share the same entries.
pub struct QueryCache<T> {
    inner: Arc<CacheInner<T>>,
}

struct CacheInner<T> {
    entries: DashMap<QueryKey, CacheEntry<T>>,
    clock: AtomicU64,
    retry: RetryPolicy,
    defaults: FetchOptions,
}

impl<T> Clone for QueryCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> QueryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(retry: RetryPolicy, defaults: FetchOptions) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: DashMap::new(),
                clock: AtomicU64::new(0),
                retry,
                defaults,
            }),
        }
    }

    pub fn defaults(&self) -> FetchOptions {
        self.inner.defaults
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.retry
    }

    fn tick(&self) -> u64 {
        self.inner.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Snapshot of one entry. Never triggers a fetch.
    pub fn get(&self, key: &QueryKey) -> Option<EntrySnapshot<T>> {
        let now = Instant::now();
        self.inner.entries.get(key).map(|e| e.snapshot(now))
    }

    /// Cached data, fresh or not.
    pub fn data(&self, key: &QueryKey) -> Option<T> {
        self.inner.entries.get(key).and_then(|e| e.data.clone())
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.entries.contains_key(key)
    }

    /// Whether `fetch` would return without touching the loader.
    pub fn is_fresh(&self, key: &QueryKey) -> bool {
        let now = Instant::now();
        self.inner
            .entries
            .get(key)
            .is_some_and(|e| !e.is_stale(now))
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<_> = self.inner.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    // ── Fetching ─────────────────────────────────────────────────────

    /// Return fresh cached data, join the in-flight fetch, or start one.
    pub async fn fetch<F, Fut>(
        &self,
        key: &QueryKey,
        load: F,
        options: FetchOptions,
    ) -> Result<T, CoreError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, CoreError>> + Send + 'static,
    {
        self.fetch_with(key, loader(load), options).await
    }

    /// [`fetch`](Self::fetch) with an already boxed loader.
    pub async fn fetch_with(
        &self,
        key: &QueryKey,
        loader: Loader<T>,
        options: FetchOptions,
    ) -> Result<T, CoreError> {
        let pending = {
            let now = Instant::now();
            let mut entry = self
                .inner
                .entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(options, now));
            entry.options = options;

            if let Some(data) = entry.fresh_data(now) {
                trace!(key = %key, "cache hit");
                return Ok(data);
            }
            if let Some(in_flight) = &entry.in_flight {
                trace!(key = %key, "joining in-flight fetch");
                in_flight.fetch.clone()
            } else {
                self.start_fetch(key, &mut entry, loader)
            }
        };
        pending.await
    }

    fn start_fetch(
        &self,
        key: &QueryKey,
        entry: &mut CacheEntry<T>,
        loader: Loader<T>,
    ) -> SharedFetch<T> {
        let started = self.tick();
        entry.status = QueryStatus::Fetching;
        entry.refetch_queued = false;
        debug!(key = %key, "fetch started");

        let cache = self.clone();
        let task_key = key.clone();
        let policy = self.inner.retry;
        let handle = tokio::spawn(async move {
            let label = task_key.to_string();
            let result = retry_with(&policy, &label, || loader()).await;
            cache.settle(&task_key, started, &result);
            result
        });

        let fetch = async move {
            handle
                .await
                .unwrap_or_else(|e| Err(CoreError::Internal(format!("fetch task failed: {e}"))))
        }
        .boxed()
        .shared();

        entry.in_flight = Some(InFlight {
            started,
            fetch: fetch.clone(),
        });
        fetch
    }

    /// Record a finished fetch. Called from the fetch task.
    fn settle(&self, key: &QueryKey, started: u64, result: &Result<T, CoreError>) {
        let Some(mut entry) = self.inner.entries.get_mut(key) else {
            debug!(key = %key, "entry removed during fetch, result not cached");
            return;
        };
        if entry.in_flight.as_ref().map(|f| f.started) != Some(started) {
            debug!(key = %key, "entry replaced during fetch, result not cached");
            return;
        }
        entry.in_flight = None;

        let now = Instant::now();
        match result {
            Ok(_) if entry.last_write > started => {
                debug!(key = %key, "local write landed during fetch, keeping local data");
                entry.status = if entry.data.is_some() {
                    QueryStatus::Success
                } else {
                    QueryStatus::Idle
                };
                entry.invalidated = true;
            }
            Ok(data) => {
                entry.store(data.clone(), now);
                entry.invalidated = entry.last_invalidate > started;
                debug!(key = %key, "fetch succeeded");
            }
            Err(error) => {
                entry.status = QueryStatus::Error;
                entry.error = Some(error.clone());
                debug!(key = %key, error = %error, "fetch failed");
            }
        }

        if entry.refetch_queued && entry.observers > 0 {
            if let Some(loader) = entry.loader.clone() {
                trace!(key = %key, "running queued refetch");
                self.start_fetch(key, &mut entry, loader);
            }
        }
        entry.refetch_queued = false;
    }

    /// Refetch an observed entry, or queue the refetch behind the running one.
    fn refetch_observed(&self, key: &QueryKey, entry: &mut CacheEntry<T>) {
        if entry.in_flight.is_some() {
            entry.refetch_queued = true;
        } else if let Some(loader) = entry.loader.clone() {
            self.start_fetch(key, entry, loader);
        }
    }

    // ── Invalidation & local writes ──────────────────────────────────

    /// Mark every key under `prefix` stale. Returns how many were hit.
    pub fn invalidate(&self, prefix: &QueryKey, mode: InvalidateMode) -> usize {
        let mut hit = 0;
        for mut item in self.inner.entries.iter_mut() {
            let (key, entry) = item.pair_mut();
            if !key.starts_with(prefix) {
                continue;
            }
            hit += 1;
            entry.invalidated = true;
            entry.last_invalidate = self.tick();
            if mode == InvalidateMode::ActiveOnly && entry.observers > 0 {
                self.refetch_observed(key, entry);
            }
        }
        debug!(prefix = %prefix, ?mode, hit, "invalidated");
        hit
    }

    pub fn invalidate_all(&self, mode: InvalidateMode) -> usize {
        self.invalidate(&QueryKey::root(), mode)
    }

    /// Replace an entry's data without touching the network.
    ///
    /// `updater` receives the current data (if any) and returns the new
    /// value, or `None` to leave the entry alone. A fetch already in flight
    /// will not overwrite what is written here.
    pub fn set_data<F>(&self, key: &QueryKey, updater: F) -> Option<T>
    where
        F: FnOnce(Option<&T>) -> Option<T>,
    {
        let now = Instant::now();
        if let Some(mut entry) = self.inner.entries.get_mut(key) {
            let next = updater(entry.data.as_ref())?;
            entry.last_write = self.tick();
            entry.store(next.clone(), now);
            trace!(key = %key, "data set locally");
            return Some(next);
        }

        let next = updater(None)?;
        let mut entry = CacheEntry::new(self.inner.defaults, now);
        entry.last_write = self.tick();
        entry.store(next.clone(), now);
        self.inner.entries.insert(key.clone(), entry);
        Some(next)
    }

    /// Drop one entry. An observed entry is reset and refetched instead, so
    /// its observers keep working. An entry with a fetch in flight is reset
    /// and kept until that fetch settles, so the key never has two requests
    /// running.
    pub fn remove(&self, key: &QueryKey) -> bool {
        let tick = self.tick();
        if self
            .inner
            .entries
            .remove_if(key, |_, entry| entry.is_detached())
            .is_some()
        {
            return true;
        }
        let Some(mut entry) = self.inner.entries.get_mut(key) else {
            return false;
        };
        entry.reset(tick);
        if entry.observers > 0 {
            self.refetch_observed(key, &mut entry);
        }
        true
    }

    /// Evict everything. Observed entries are reset and refetched; entries
    /// with a fetch in flight are reset and kept until it settles.
    pub fn clear(&self) {
        let tick = self.tick();
        self.inner.entries.retain(|_, entry| !entry.is_detached());
        for mut item in self.inner.entries.iter_mut() {
            let (key, entry) = item.pair_mut();
            entry.reset(tick);
            if entry.observers > 0 {
                self.refetch_observed(key, entry);
            }
        }
        debug!(remaining = self.inner.entries.len(), "cache cleared");
    }

    // ── Observers ────────────────────────────────────────────────────

    /// Register a mounted consumer of `key`. Keeps the entry alive and
    /// lets `invalidate(.., ActiveOnly)` refetch it with `loader`.
    pub fn observe(
        &self,
        key: &QueryKey,
        loader: Loader<T>,
        options: FetchOptions,
    ) -> QueryObserver<T> {
        let receiver = {
            let now = Instant::now();
            let mut entry = self
                .inner
                .entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(options, now));
            entry.observers += 1;
            entry.options = options;
            entry.loader = Some(Arc::clone(&loader));
            entry.publisher.subscribe()
        };
        trace!(key = %key, "observer added");
        QueryObserver::new(self.clone(), key.clone(), loader, options, receiver)
    }

    pub(crate) fn unobserve(&self, key: &QueryKey) {
        if let Some(mut entry) = self.inner.entries.get_mut(key) {
            entry.observers = entry.observers.saturating_sub(1);
            if entry.observers == 0 {
                entry.unobserved_since = Instant::now();
            }
            trace!(key = %key, remaining = entry.observers, "observer removed");
        }
    }

    // ── Garbage collection ───────────────────────────────────────────

    /// Evict unobserved, idle entries past their `gc_after` window.
    pub fn collect_garbage(&self) -> usize {
        let now = Instant::now();
        let mut evicted = 0;
        self.inner.entries.retain(|key, entry| {
            if entry.is_collectable(now) {
                trace!(key = %key, "evicted");
                evicted += 1;
                false
            } else {
                true
            }
        });
        if evicted > 0 {
            debug!(evicted, "garbage collected");
        }
        evicted
    }

    /// Run [`collect_garbage`](Self::collect_garbage) every `interval`
    /// until `cancel` fires.
    pub fn spawn_gc(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        cache.collect_garbage();
                    }
                }
            }
        })
    }
}
