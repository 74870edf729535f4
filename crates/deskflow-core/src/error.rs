// ── Core error types ──
//
// User-facing errors from deskflow-core. Consumers never see reqwest or
// WebSocket errors directly: the `From<deskflow_api::Error>` impl
// translates transport-layer errors into domain variants.
//
// `CoreError` is `Clone` so one in-flight fetch can settle many waiters.

use thiserror::Error;

/// Error text fragments identifying transport failures that are not worth
/// retrying: the connection was torn down underneath the request, and an
/// immediate retry would hit the same broken socket. Compared lowercase.
pub const NON_RETRYABLE_PATTERNS: &[&str] = &[
    "err_connection_closed",
    "err_connection_reset",
    "err_http2_protocol_error",
    "connection reset",
    "connection closed",
    "aborted",
];

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error("Remote data source is not configured")]
    NotConfigured,

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach remote at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Realtime channel failed: {reason}")]
    Realtime { reason: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("{resource} '{identifier}' not found")]
    NotFound {
        resource: String,
        identifier: String,
    },

    #[error("Invalid record: {message}")]
    InvalidRecord { message: String },

    // ── Remote errors (wrapped, not exposed raw) ─────────────────────
    #[error("Request rejected (HTTP {status}): {message}")]
    Rejected {
        status: u16,
        message: String,
        /// Backend error code (e.g. a SQLSTATE like "23505").
        code: Option<String>,
    },

    #[error("Remote error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Free-form failure text, without URLs or resource names.
    fn detail(&self) -> Option<&str> {
        match self {
            Self::ConnectionFailed { reason, .. } | Self::Realtime { reason } => Some(reason),
            Self::Rejected { message, .. }
            | Self::Api { message, .. }
            | Self::Internal(message) => Some(message),
            Self::NotConfigured
            | Self::Config { .. }
            | Self::Timeout { .. }
            | Self::NotFound { .. }
            | Self::InvalidRecord { .. } => None,
        }
    }

    /// Whether the failure text matches one of [`NON_RETRYABLE_PATTERNS`].
    pub fn is_non_retryable_transport(&self) -> bool {
        self.detail().is_some_and(|detail| {
            let text = detail.to_lowercase();
            NON_RETRYABLE_PATTERNS.iter().any(|p| text.contains(p))
        })
    }

    /// 4xx-equivalent failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Rejected { .. } | Self::NotFound { .. } | Self::InvalidRecord { .. }
        )
    }

    /// Whether the retry policy may try this operation again.
    pub fn is_retryable(&self) -> bool {
        if self.is_non_retryable_transport() {
            return false;
        }
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::Realtime { .. } => true,
            Self::Api { status, .. } => status.is_none_or(|s| s >= 500 || s == 429),
            Self::NotConfigured
            | Self::Config { .. }
            | Self::NotFound { .. }
            | Self::InvalidRecord { .. }
            | Self::Rejected { .. }
            | Self::Internal(_) => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<deskflow_api::Error> for CoreError {
    fn from(err: deskflow_api::Error) -> Self {
        use deskflow_api::Error as Api;

        match err {
            Api::Transport(ref e) => {
                if e.is_timeout() {
                    Self::Timeout { timeout_secs: 0 }
                } else if e.is_connect() || e.is_request() {
                    Self::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: error_chain(e),
                    }
                } else if e.status().map(|s| s.as_u16()) == Some(404) {
                    Self::NotFound {
                        resource: "resource".into(),
                        identifier: e.url().map(|u| u.path().to_string()).unwrap_or_default(),
                    }
                } else if let Some(status) = e.status().filter(|s| s.is_client_error()) {
                    Self::Rejected {
                        status: status.as_u16(),
                        message: e.to_string(),
                        code: None,
                    }
                } else {
                    Self::Api {
                        message: error_chain(e),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            Api::InvalidUrl(e) => Self::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Setup(message) => Self::Config { message },
            Api::Timeout { timeout_secs } => Self::Timeout { timeout_secs },
            Api::Remote {
                status: 404,
                message,
                ..
            } => Self::NotFound {
                resource: "row".into(),
                identifier: message,
            },
            Api::Remote {
                status,
                message,
                code,
            } if (400..500).contains(&status) && status != 429 => Self::Rejected {
                status,
                message,
                code,
            },
            Api::Remote {
                status, message, ..
            } => Self::Api {
                message,
                status: Some(status),
            },
            Api::EmptyResult { table, id } => Self::NotFound {
                resource: table,
                identifier: id,
            },
            Api::WebSocketConnect(reason) => Self::Realtime { reason },
            Api::WebSocketClosed { code, reason } => Self::Realtime {
                reason: format!("closed (code {code}): {reason}"),
            },
            Api::Deserialization { message, body: _ } => Self::InvalidRecord { message },
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidRecord {
            message: err.to_string(),
        }
    }
}

/// Render an error with its `source()` chain; reqwest hides the interesting
/// part (e.g. "connection reset by peer") in the sources.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_reset_is_not_retryable() {
        let err = CoreError::ConnectionFailed {
            url: "https://x.example/rest/v1/tickets".into(),
            reason: "error sending request: connection reset by peer".into(),
        };
        assert!(err.is_non_retryable_transport());
        assert!(!err.is_retryable());
    }

    #[test]
    fn browser_style_error_codes_match_case_insensitively() {
        let err = CoreError::Api {
            message: "net::ERR_HTTP2_PROTOCOL_ERROR".into(),
            status: None,
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn plain_connection_failure_is_retryable() {
        let err = CoreError::ConnectionFailed {
            url: "https://x.example".into(),
            reason: "dns error: no record found".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn url_text_does_not_affect_retry_classification() {
        let err = CoreError::ConnectionFailed {
            url: "https://aborted-jobs.example/rest/v1/connection_closed_log".into(),
            reason: "dns error: no record found".into(),
        };
        assert!(!err.is_non_retryable_transport());
        assert!(err.is_retryable());
    }

    #[test]
    fn configuration_and_client_errors_are_final() {
        assert!(!CoreError::NotConfigured.is_retryable());
        let rejected = CoreError::Rejected {
            status: 422,
            message: "bad payload".into(),
            code: None,
        };
        assert!(rejected.is_client_error());
        assert!(!rejected.is_retryable());
    }

    #[test]
    fn server_errors_are_retryable() {
        let err = CoreError::Api {
            message: "upstream".into(),
            status: Some(503),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn remote_conflict_maps_to_rejected() {
        let err = CoreError::from(deskflow_api::Error::Remote {
            message: "duplicate key".into(),
            code: Some("23505".into()),
            status: 409,
        });
        assert!(matches!(
            err,
            CoreError::Rejected { status: 409, ref code, .. } if code.as_deref() == Some("23505")
        ));
    }

    #[test]
    fn empty_write_result_maps_to_not_found() {
        let err = CoreError::from(deskflow_api::Error::EmptyResult {
            table: "tickets".into(),
            id: "t1".into(),
        });
        assert!(matches!(err, CoreError::NotFound { ref resource, .. } if resource == "tickets"));
    }
}
