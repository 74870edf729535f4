//! Shared configuration for deskflow tools.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext), and
//! translation to `deskflow_core::SyncConfig`. The CLI layers its
//! `GlobalOpts` overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use deskflow_core::{SourceConfig, SyncConfig};

/// Keyring service under which API keys are stored as `{profile}/api-key`.
pub const KEYRING_SERVICE: &str = "deskflow";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is requested.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use: the requested one, else the default.
    pub fn profile_name(&self, requested: Option<&str>) -> String {
        requested
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Fall back to the in-memory mock when no backend is configured.
    #[serde(default = "default_mock_fallback")]
    pub mock_fallback: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
            mock_fallback: default_mock_fallback(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    15
}
fn default_mock_fallback() -> bool {
    true
}

/// A named backend profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Backend project URL (e.g., "https://abc.example.co").
    pub url: Option<String>,

    /// API key (plaintext; prefer keyring or env var).
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,

    /// User whose notifications `watch` follows by default.
    pub user_id: Option<String>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Override the cache staleness window, in seconds.
    pub stale_after_secs: Option<u64>,

    /// Override the cache eviction window, in seconds.
    pub gc_after_secs: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "deskflow", "deskflow").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("deskflow");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Defaults, then the TOML file at `path`, then `DESKFLOW_*` variables
/// (`__` separates nested keys, e.g. `DESKFLOW_DEFAULTS__TIMEOUT`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("DESKFLOW_").split("__"));

    let config: Config = figment.extract()?;
    debug!(path = %path.display(), profiles = config.profiles.len(), "config loaded");
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(&config_path(), cfg)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Resolve an API key from the credential chain (no CLI flag step).
pub fn resolve_api_key(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's api_key_env → env var lookup
    if let Some(val) = profile
        .api_key_env
        .as_deref()
        .and_then(|name| std::env::var(name).ok())
    {
        return Ok(SecretString::from(val));
    }

    // 2. System keyring
    if let Some(secret) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/api-key"))
        .ok()
        .and_then(|entry| entry.get_password().ok())
    {
        return Ok(SecretString::from(secret));
    }

    // 3. Plaintext in config
    if let Some(ref key) = profile.api_key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Parse and validate a backend URL.
pub fn parse_url(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "url".into(),
            reason: format!("expected an http(s) URL, got '{raw}'"),
        });
    }
    Ok(url)
}

/// Build a `SyncConfig` from a profile with no CLI flag overrides.
///
/// A profile without a URL or API key yields the mock source when
/// `defaults.mock_fallback` is set, and the disabled source otherwise. A
/// malformed URL is always an error.
pub fn profile_to_sync_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<SyncConfig, ConfigError> {
    let source = match profile.url.as_deref() {
        Some(raw) => {
            let url = parse_url(raw)?;
            match resolve_api_key(profile, profile_name) {
                Ok(api_key) => SourceConfig::Remote { url, api_key },
                Err(ConfigError::NoCredentials { .. }) => fallback_source(defaults, profile_name),
                Err(e) => return Err(e),
            }
        }
        None => fallback_source(defaults, profile_name),
    };

    let mut config = SyncConfig {
        source,
        request_timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        accept_invalid_certs: profile.insecure.unwrap_or(defaults.insecure),
        ..SyncConfig::default()
    };
    if let Some(secs) = profile.stale_after_secs {
        config.cache.stale_after = Duration::from_secs(secs);
    }
    if let Some(secs) = profile.gc_after_secs {
        config.cache.gc_after = Duration::from_secs(secs);
    }
    Ok(config)
}

fn fallback_source(defaults: &Defaults, profile_name: &str) -> SourceConfig {
    let source = if defaults.mock_fallback {
        SourceConfig::Mock
    } else {
        SourceConfig::Disabled
    };
    debug!(profile = profile_name, source = source.kind(), "no backend configured");
    source
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    fn remote_profile() -> Profile {
        Profile {
            url: Some("https://desk.example.co".into()),
            api_key: Some("anon-key".into()),
            api_key_env: Some("DESKFLOW_TEST_KEY_THAT_IS_NEVER_SET".into()),
            ..Profile::default()
        }
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert_eq!(config.defaults.timeout, 15);
        assert!(config.defaults.mock_fallback);
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "office"

[defaults]
output = "json"
mock_fallback = false

[profiles.office]
url = "https://desk.example.co"
user_id = "tech-1"
stale_after_secs = 60
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.profile_name(None), "office");
        assert_eq!(config.profile_name(Some("lab")), "lab");
        assert_eq!(config.defaults.output, "json");
        assert!(!config.defaults.mock_fallback);
        let office = config.profile("office").unwrap();
        assert_eq!(office.user_id.as_deref(), Some("tech-1"));
        assert_eq!(office.stale_after_secs, Some(60));
    }

    #[test]
    fn save_then_load_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.profiles.insert("default".into(), remote_profile());

        save_config_to(&path, &config).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profiles, config.profiles);
    }

    #[test]
    fn plaintext_key_is_last_resort() {
        let key = resolve_api_key(&remote_profile(), "deskflow-test-profile").unwrap();
        assert_eq!(key.expose_secret(), "anon-key");

        let err = resolve_api_key(&Profile::default(), "deskflow-test-profile").unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { .. }));
    }

    #[test]
    fn complete_profile_builds_remote_source() {
        let profile = Profile {
            timeout: Some(5),
            gc_after_secs: Some(120),
            ..remote_profile()
        };
        let config =
            profile_to_sync_config(&profile, "deskflow-test-profile", &Defaults::default())
                .unwrap();
        assert_eq!(config.source.kind(), "remote");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.cache.gc_after, Duration::from_secs(120));
        assert_eq!(config.cache.stale_after, Duration::from_secs(300));
    }

    #[test]
    fn incomplete_profile_falls_back() {
        let profile = Profile::default();
        let mock = profile_to_sync_config(&profile, "p", &Defaults::default()).unwrap();
        assert_eq!(mock.source.kind(), "mock");

        let strict = Defaults {
            mock_fallback: false,
            ..Defaults::default()
        };
        let disabled = profile_to_sync_config(&profile, "p", &strict).unwrap();
        assert_eq!(disabled.source.kind(), "disabled");
    }

    #[test]
    fn malformed_url_is_rejected() {
        let profile = Profile {
            url: Some("ftp://desk.example.co".into()),
            ..remote_profile()
        };
        let err = profile_to_sync_config(&profile, "p", &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "url"));
        assert!(parse_url("not a url").is_err());
    }
}
