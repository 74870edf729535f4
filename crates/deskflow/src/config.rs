//! CLI configuration: a thin wrapper around `deskflow_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides (--url,
//! --api-key, --mock, --timeout, --insecure).

use std::time::Duration;

use secrecy::SecretString;

use deskflow_core::{SourceConfig, SyncConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use deskflow_config::{
    Config, KEYRING_SERVICE, Profile, config_path, load_config_or_default, save_config,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.profile_name(global.profile.as_deref())
}

/// The active profile. A profile requested by name must exist; the
/// implicit default may be missing, in which case it is empty.
pub fn active_profile(global: &GlobalOpts, config: &Config) -> Result<(String, Profile), CliError> {
    let name = active_profile_name(global, config);
    match config.profile(&name) {
        Some(profile) => Ok((name, profile.clone())),
        None if global.profile.is_some() => {
            let mut available: Vec<_> = config.profiles.keys().cloned().collect();
            available.sort();
            Err(CliError::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            })
        }
        None => Ok((name, Profile::default())),
    }
}

/// Translate config file, profile, and global flags into a `SyncConfig`.
///
/// `--mock` wins outright. An explicit `--url` or `--api-key` demands a
/// complete remote setup; otherwise the profile decides, falling back per
/// `defaults.mock_fallback`.
pub fn build_sync_config(global: &GlobalOpts, config: &Config) -> Result<SyncConfig, CliError> {
    let mut sync = if global.mock {
        SyncConfig::mock()
    } else {
        let (name, profile) = active_profile(global, config)?;
        let mut sync = deskflow_config::profile_to_sync_config(&profile, &name, &config.defaults)?;

        if global.url.is_some() || global.api_key.is_some() {
            let raw = global
                .url
                .as_deref()
                .or(profile.url.as_deref())
                .ok_or(CliError::NotConfigured)?;
            let url = deskflow_config::parse_url(raw)?;
            let api_key = match &global.api_key {
                Some(key) => SecretString::from(key.clone()),
                None => deskflow_config::resolve_api_key(&profile, &name)?,
            };
            sync.source = SourceConfig::Remote { url, api_key };
        }
        sync
    };

    if let Some(secs) = global.timeout {
        sync.request_timeout = Duration::from_secs(secs);
    }
    if global.insecure {
        sync.accept_invalid_certs = true;
    }
    tracing::debug!(source = sync.source.kind(), "resolved sync config");
    Ok(sync)
}
