//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use deskflow_config::ConfigError;
use deskflow_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the backend at {url}")]
    #[diagnostic(
        code(deskflow::connection_failed),
        help(
            "Check the project URL and your network.\n\
             URL: {url}\n\
             Try: deskflow --mock list tickets"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("No backend configured")]
    #[diagnostic(
        code(deskflow::not_configured),
        help(
            "Create a profile with: deskflow config init --url <URL>\n\
             Or pass --url and --api-key, or run against sample data with --mock."
        )
    )]
    NotConfigured,

    #[error("Realtime channel failed: {reason}")]
    #[diagnostic(code(deskflow::realtime))]
    Realtime { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(deskflow::no_credentials),
        help(
            "Store a key with: deskflow config set-key <KEY>\n\
             Or set the DESKFLOW_API_KEY environment variable."
        )
    )]
    NoCredentials { profile: String },

    #[error("The backend refused the request (HTTP {status})")]
    #[diagnostic(
        code(deskflow::auth_failed),
        help("Verify the API key for this profile.")
    )]
    AuthFailed { status: u16 },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource} '{identifier}' not found")]
    #[diagnostic(
        code(deskflow::not_found),
        help("Run: deskflow list {resource} to see what exists")
    )]
    NotFound {
        resource: String,
        identifier: String,
    },

    #[error("Write rejected (HTTP {status}): {message}")]
    #[diagnostic(code(deskflow::rejected))]
    Rejected { status: u16, message: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Backend error: {message}")]
    #[diagnostic(code(deskflow::api_error))]
    ApiError { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(deskflow::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(deskflow::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: deskflow config init --url <URL>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(deskflow::config))]
    Config(ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(deskflow::timeout),
        help("Increase timeout with --timeout or check backend responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(deskflow::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NotConfigured | Self::Realtime { .. } => {
                exit_code::CONNECTION
            }
            Self::NoCredentials { .. } | Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            Self::ApiError { .. } | Self::Config(_) | Self::Io(_) | Self::Render(_) => {
                exit_code::GENERAL
            }
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotConfigured => Self::NotConfigured,

            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },

            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },

            CoreError::Realtime { reason } => Self::Realtime { reason },

            CoreError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },

            CoreError::Rejected {
                status: status @ (401 | 403),
                ..
            } => Self::AuthFailed { status },

            CoreError::Rejected {
                status, message, ..
            } => Self::Rejected { status, message },

            CoreError::InvalidRecord { message } => Self::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Api { message, .. } | CoreError::Internal(message) => {
                Self::ApiError { message }
            }
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config(other),
        }
    }
}
