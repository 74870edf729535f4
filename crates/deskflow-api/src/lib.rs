//! Async bindings for the deskflow remote data source.
//!
//! Two surfaces are exposed:
//!
//! - **[`RestClient`]**: row CRUD over named collections (`clients`,
//!   `tickets`, `technicians`, `articles`, `categories`) against a
//!   PostgREST-style endpoint.
//! - **[`RealtimeClient`]**: a single change-feed channel over WebSocket.
//!   It reports acknowledgement, changes, and failures as [`FeedEvent`]s and
//!   never reconnects on its own; reconnect policy belongs to the caller.

pub mod error;
pub mod realtime;
pub mod rest;
pub mod transport;

pub use error::Error;
pub use realtime::{
    ChangeBinding, ChangeKind, ChangePayload, FeedEvent, FeedHandle, RealtimeClient,
};
pub use rest::{RestClient, Row};
pub use transport::TransportConfig;
