// ── Runtime configuration for the sync core ──
//
// These types describe *how* to reach the data source and how the cache,
// prefetcher, and realtime session behave. They are NOT the on-disk config
// format (that lives in deskflow-config).

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::store::{FetchOptions, RetryPolicy};

/// Which data source backs the client.
#[derive(Debug, Clone)]
pub enum SourceConfig {
    /// The hosted backend: REST rows plus the realtime change feed.
    Remote { url: Url, api_key: SecretString },
    /// In-memory seeded tables, for running without a backend.
    Mock,
    /// No backend configured; every call fails with `NotConfigured`.
    Disabled,
}

impl SourceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Remote { .. } => "remote",
            Self::Mock => "mock",
            Self::Disabled => "disabled",
        }
    }
}

/// Query cache behaviour.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Data younger than this is served without a network request.
    pub stale_after: Duration,
    /// Unobserved entries are evicted this long after their last observer left.
    pub gc_after: Duration,
    /// How often the background sweeper looks for expired entries.
    pub gc_interval: Duration,
    /// Retry policy for reads.
    pub retry: RetryPolicy,
    /// Retry policy for writes.
    pub mutation_retry: RetryPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(5 * 60),
            gc_after: Duration::from_secs(10 * 60),
            gc_interval: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            mutation_retry: RetryPolicy::mutations(),
        }
    }
}

impl CacheConfig {
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            stale_after: self.stale_after,
            gc_after: self.gc_after,
        }
    }
}

/// Prefetch timing.
#[derive(Debug, Clone)]
pub struct PrefetchConfig {
    /// Quiet period after the last route change before prefetching.
    pub route_debounce: Duration,
    /// Minimum spacing between hover-triggered prefetches of one resource.
    pub hover_throttle: Duration,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            route_debounce: Duration::from_millis(300),
            hover_throttle: Duration::from_millis(200),
        }
    }
}

/// Realtime subscription lifecycle.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Delay between enabling a session and opening its channel.
    pub initial_delay: Duration,
    /// Reconnect delay is `backoff_base * 2^attempt`.
    pub backoff_base: Duration,
    /// Consecutive failed attempts before the session gives up.
    pub max_attempts: u32,
    /// Channel names are `{channel_prefix}-{user_id}`.
    pub channel_prefix: String,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            backoff_base: Duration::from_millis(1000),
            max_attempts: 5,
            channel_prefix: "notifications".into(),
        }
    }
}

/// Everything needed to build a [`SyncClient`](crate::SyncClient).
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub source: SourceConfig,
    /// Upper bound for a single remote call.
    pub request_timeout: Duration,
    /// Skip TLS verification for the remote backend.
    pub accept_invalid_certs: bool,
    pub cache: CacheConfig,
    pub prefetch: PrefetchConfig,
    pub realtime: RealtimeConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::Disabled,
            request_timeout: Duration::from_secs(15),
            accept_invalid_certs: false,
            cache: CacheConfig::default(),
            prefetch: PrefetchConfig::default(),
            realtime: RealtimeConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn mock() -> Self {
        Self {
            source: SourceConfig::Mock,
            ..Self::default()
        }
    }

    pub fn remote(url: Url, api_key: SecretString) -> Self {
        Self {
            source: SourceConfig::Remote { url, api_key },
            ..Self::default()
        }
    }
}
