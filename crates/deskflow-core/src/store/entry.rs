// ── Cache entries ──

use std::time::Duration;

use strum::Display;
use tokio::sync::watch;
use tokio::time::Instant;

use super::query_cache::{Loader, SharedFetch};
use crate::error::CoreError;

/// Lifecycle of one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum QueryStatus {
    /// Created but never settled.
    Idle,
    Fetching,
    Success,
    Error,
}

/// Per-key timing windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Data younger than this is returned without calling the loader.
    pub stale_after: Duration,
    /// Eviction delay once the last observer is gone.
    pub gc_after: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(5 * 60),
            gc_after: Duration::from_secs(10 * 60),
        }
    }
}

/// Point-in-time copy of an entry, returned by `QueryCache::get`.
#[derive(Debug, Clone)]
pub struct EntrySnapshot<T> {
    pub data: Option<T>,
    pub status: QueryStatus,
    pub error: Option<CoreError>,
    pub fetched_at: Option<Instant>,
    pub is_stale: bool,
    pub is_fetching: bool,
    pub observers: usize,
}

pub(crate) struct InFlight<T> {
    /// Clock tick at which the fetch started; doubles as its identity.
    pub(crate) started: u64,
    pub(crate) fetch: SharedFetch<T>,
}

pub(crate) struct CacheEntry<T> {
    pub(crate) data: Option<T>,
    pub(crate) fetched_at: Option<Instant>,
    pub(crate) options: FetchOptions,
    pub(crate) status: QueryStatus,
    pub(crate) error: Option<CoreError>,
    pub(crate) invalidated: bool,

    // Cache-wide clock ticks of the latest local write and invalidation.
    pub(crate) last_write: u64,
    pub(crate) last_invalidate: u64,

    pub(crate) observers: usize,
    pub(crate) unobserved_since: Instant,
    pub(crate) loader: Option<Loader<T>>,
    pub(crate) in_flight: Option<InFlight<T>>,
    /// An active refetch was requested while a fetch was already running.
    pub(crate) refetch_queued: bool,

    pub(crate) publisher: watch::Sender<Option<T>>,
}

impl<T: Clone> CacheEntry<T> {
    pub(crate) fn new(options: FetchOptions, now: Instant) -> Self {
        let (publisher, _) = watch::channel(None);
        Self {
            data: None,
            fetched_at: None,
            options,
            status: QueryStatus::Idle,
            error: None,
            invalidated: false,
            last_write: 0,
            last_invalidate: 0,
            observers: 0,
            unobserved_since: now,
            loader: None,
            in_flight: None,
            refetch_queued: false,
            publisher,
        }
    }

    pub(crate) fn is_stale(&self, now: Instant) -> bool {
        if self.invalidated || self.data.is_none() {
            return true;
        }
        self.fetched_at
            .is_none_or(|at| now.duration_since(at) >= self.options.stale_after)
    }

    pub(crate) fn fresh_data(&self, now: Instant) -> Option<T> {
        if self.is_stale(now) {
            None
        } else {
            self.data.clone()
        }
    }

    pub(crate) fn store(&mut self, data: T, now: Instant) {
        self.data = Some(data.clone());
        self.fetched_at = Some(now);
        self.status = QueryStatus::Success;
        self.error = None;
        if self.observers == 0 {
            self.unobserved_since = now;
        }
        self.publisher.send_replace(Some(data));
    }

    /// Drop data but keep observers, loader, and publisher.
    pub(crate) fn reset(&mut self, tick: u64) {
        self.data = None;
        self.fetched_at = None;
        self.error = None;
        self.status = if self.in_flight.is_some() {
            QueryStatus::Fetching
        } else {
            QueryStatus::Idle
        };
        self.invalidated = true;
        self.last_write = tick;
        self.last_invalidate = tick;
        self.publisher.send_replace(None);
    }

    /// No observers and no fetch in flight: safe to drop outright.
    pub(crate) fn is_detached(&self) -> bool {
        self.observers == 0 && self.in_flight.is_none()
    }

    pub(crate) fn is_collectable(&self, now: Instant) -> bool {
        self.is_detached()
            && now.duration_since(self.unobserved_since) >= self.options.gc_after
    }

    pub(crate) fn snapshot(&self, now: Instant) -> EntrySnapshot<T> {
        EntrySnapshot {
            data: self.data.clone(),
            status: self.status,
            error: self.error.clone(),
            fetched_at: self.fetched_at,
            is_stale: self.is_stale(now),
            is_fetching: self.in_flight.is_some(),
            observers: self.observers,
        }
    }
}
