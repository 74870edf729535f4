use thiserror::Error;

/// Top-level error type for the `deskflow-api` crate.
///
/// Covers every failure mode of the remote data source: HTTP transport,
/// structured row-API errors, and the realtime WebSocket.
/// `deskflow-core` maps these into user-facing errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, reset, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Client construction failed (TLS backend, invalid header value).
    #[error("Client setup failed: {0}")]
    Setup(String),

    // ── Row API ─────────────────────────────────────────────────────
    /// Structured error returned by the row API.
    #[error("Remote error (HTTP {status}): {message}")]
    Remote {
        message: String,
        code: Option<String>,
        status: u16,
    },

    /// A write that should have returned the affected row returned nothing.
    #[error("Remote returned no row for {table}/{id}")]
    EmptyResult { table: String, id: String },

    // ── Realtime ────────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Timeout { .. } | Self::WebSocketConnect(_) => true,
            Self::Remote { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns `true` for 4xx responses (never retried).
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Transport(e) => e.status().is_some_and(|s| s.is_client_error()),
            Self::Remote { status, .. } => (400..500).contains(status) && *status != 429,
            _ => false,
        }
    }

    /// HTTP status code, if the error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Extract the remote error code, if available.
    pub fn api_error_code(&self) -> Option<&str> {
        match self {
            Self::Remote { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
