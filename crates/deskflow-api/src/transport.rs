// Shared transport configuration for building reqwest::Client instances.
//
// The REST client and the realtime handshake share timeout and auth
// header settings through this module.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Accept self-signed certificates (self-hosted backends).
    pub accept_invalid_certs: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            accept_invalid_certs: false,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` that sends `apikey` and a bearer token on
    /// every request.
    pub fn build_client(&self, api_key: &SecretString) -> Result<reqwest::Client, Error> {
        let headers = auth_headers(api_key)?;

        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("deskflow/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Setup(format!("failed to build HTTP client: {e}")))
    }
}

/// `apikey` + `Authorization: Bearer` header pair, both marked sensitive.
pub(crate) fn auth_headers(api_key: &SecretString) -> Result<HeaderMap, Error> {
    let raw = api_key.expose_secret();

    let mut key_value = HeaderValue::from_str(raw)
        .map_err(|e| Error::Setup(format!("invalid API key header value: {e}")))?;
    key_value.set_sensitive(true);

    let mut bearer = HeaderValue::from_str(&format!("Bearer {raw}"))
        .map_err(|e| Error::Setup(format!("invalid API key header value: {e}")))?;
    bearer.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert("apikey", key_value);
    headers.insert(AUTHORIZATION, bearer);
    Ok(headers)
}
