// Async HTTP client for the row API (PostgREST dialect).
//
// Base path: {url}/rest/v1/{table}
// Auth: `apikey` header + bearer token

use secrecy::SecretString;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// A single row as returned by the remote: a JSON object.
pub type Row = serde_json::Map<String, serde_json::Value>;

const PREFER: &str = "prefer";
const RETURN_REPRESENTATION: &str = "return=representation";

// ── Error response shape from the row API ────────────────────────────

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for row-level CRUD over named collections.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
}

impl RestClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from the project URL and API key.
    pub fn new(
        project_url: &str,
        api_key: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client(api_key)?;
        Self::from_reqwest(project_url, http)
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(project_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(project_url)?;
        Ok(Self { http, base_url })
    }

    /// `https://project.example` -> `https://project.example/rest/v1/`
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();

        if path.ends_with("/rest/v1") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/rest/v1/"));
        }

        Ok(url)
    }

    fn url(&self, table: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(table)?)
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Fetch every row of `table`, optionally sorted by a PostgREST
    /// `order` expression such as `created_at.desc`.
    pub async fn select(&self, table: &str, order: Option<&str>) -> Result<Vec<Row>, Error> {
        let url = self.url(table)?;
        debug!("GET {url}");

        let mut request = self.http.get(url).query(&[("select", "*")]);
        if let Some(order) = order {
            request = request.query(&[("order", order)]);
        }
        let resp = request.send().await?;
        handle_response(resp).await
    }

    /// Insert one row and return it as stored.
    pub async fn insert(&self, table: &str, row: &Row) -> Result<Row, Error> {
        let url = self.url(table)?;
        debug!("POST {url}");

        let resp = self
            .http
            .post(url)
            .header(PREFER, RETURN_REPRESENTATION)
            .json(row)
            .send()
            .await?;
        let rows: Vec<Row> = handle_response(resp).await?;
        first_row(rows, table, "<new>")
    }

    /// Patch the row with `id` and return it as stored.
    pub async fn update(&self, table: &str, id: &str, patch: &Row) -> Result<Row, Error> {
        let url = self.url(table)?;
        debug!("PATCH {url} id={id}");

        let resp = self
            .http
            .patch(url)
            .query(&[("id", format!("eq.{id}"))])
            .header(PREFER, RETURN_REPRESENTATION)
            .json(patch)
            .send()
            .await?;
        let rows: Vec<Row> = handle_response(resp).await?;
        first_row(rows, table, id)
    }

    /// Delete the row with `id`.
    pub async fn delete(&self, table: &str, id: &str) -> Result<(), Error> {
        let url = self.url(table)?;
        debug!("DELETE {url} id={id}");

        let resp = self
            .http
            .delete(url)
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;
        handle_empty(resp).await
    }
}

// ── Response handling ────────────────────────────────────────────────

async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    if status.is_success() {
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    } else {
        Err(parse_error(status, resp).await)
    }
}

async fn handle_empty(resp: reqwest::Response) -> Result<(), Error> {
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(parse_error(status, resp).await)
    }
}

async fn parse_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
    let raw = resp.text().await.unwrap_or_default();

    if let Ok(err) = serde_json::from_str::<ErrorResponse>(&raw) {
        Error::Remote {
            status: status.as_u16(),
            message: err.message.unwrap_or_else(|| status.to_string()),
            code: err.code,
        }
    } else {
        Error::Remote {
            status: status.as_u16(),
            message: if raw.is_empty() {
                status.to_string()
            } else {
                raw
            },
            code: None,
        }
    }
}

fn first_row(rows: Vec<Row>, table: &str, id: &str) -> Result<Row, Error> {
    rows.into_iter().next().ok_or_else(|| Error::EmptyResult {
        table: table.to_owned(),
        id: id.to_owned(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_rest_prefix() {
        let url = RestClient::normalize_base_url("https://abc.example.co").unwrap();
        assert_eq!(url.as_str(), "https://abc.example.co/rest/v1/");
    }

    #[test]
    fn base_url_keeps_existing_prefix() {
        let url = RestClient::normalize_base_url("https://abc.example.co/rest/v1/").unwrap();
        assert_eq!(url.as_str(), "https://abc.example.co/rest/v1/");
    }

    #[test]
    fn table_joins_onto_base() {
        let client =
            RestClient::from_reqwest("http://localhost:54321", reqwest::Client::new()).unwrap();
        assert_eq!(
            client.url("tickets").unwrap().as_str(),
            "http://localhost:54321/rest/v1/tickets"
        );
    }
}
