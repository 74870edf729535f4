//! Data-synchronization core for the deskflow support dashboard.
//!
//! UI code (pages, forms, tables) calls into this crate; everything that
//! touches the remote data source goes through it:
//!
//! - **[`QueryCache`]**: keyed cache of fetched collections with staleness
//!   and garbage-collection windows, capped exponential retry, and
//!   at-most-one in-flight request per key. Concurrent callers for the same
//!   key share one underlying request.
//!
//! - **[`MutationCoordinator`]**: confirmed writes: the remote write runs
//!   first, then the returned row is patched into the cached collection and
//!   the key is marked stale without forcing mounted consumers to refetch.
//!
//! - **[`PrefetchScheduler`]**: route-driven (debounced) and hover-driven
//!   (throttled) prefetching. Best effort: failures are only logged.
//!
//! - **[`RealtimeManager`] / [`RealtimeSession`]**: one change-feed
//!   subscription per user, driven by an explicit [`SessionMachine`] with a
//!   delayed start, exponential-backoff reconnects, and a retry ceiling.
//!
//! - **[`SyncClient`]**: facade wiring the above to a [`DataSource`]
//!   selected by [`SyncConfig`]: the remote backend, the in-memory mock, or a
//!   disabled source that fails every call with [`CoreError::NotConfigured`].

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod mutation;
pub mod prefetch;
pub mod realtime;
pub mod source;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::SyncClient;
pub use config::{CacheConfig, PrefetchConfig, RealtimeConfig, SourceConfig, SyncConfig};
pub use error::CoreError;
pub use mutation::{MutationCoordinator, MutationIntent, MutationOutcome, Operation, Patch};
pub use prefetch::{PrefetchScheduler, RouteTable};
pub use realtime::{
    NotificationConsumer, RealtimeManager, RealtimeSession, SessionMachine, SessionState,
};
pub use source::{ChannelSpec, DataSource, DisabledSource, MockSource, RemoteSource};
pub use store::{
    EntrySnapshot, FetchOptions, InvalidateMode, QueryCache, QueryKey, QueryObserver,
    QueryStatus, RetryPolicy,
};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Article, Category, Client, Entity, Notification, Record, Resource, RowId, Rows, Technician,
    Ticket, TicketDraft, TicketPriority, TicketStatus,
};
