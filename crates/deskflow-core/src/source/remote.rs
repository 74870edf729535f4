// ── Remote backend ──

use std::time::Duration;

use deskflow_api::{FeedHandle, RealtimeClient, RestClient, Row, TransportConfig};
use futures::FutureExt;
use futures::future::BoxFuture;
use secrecy::SecretString;
use tracing::debug;
use url::Url;

use super::{ChannelSpec, DataSource, with_timeout};
use crate::error::CoreError;
use crate::model::{Resource, RowId};

/// REST rows plus the websocket change feed of one hosted project.
pub struct RemoteSource {
    rest: RestClient,
    realtime: RealtimeClient,
    request_timeout: Duration,
}

impl RemoteSource {
    pub fn new(
        url: &Url,
        api_key: &SecretString,
        request_timeout: Duration,
        accept_invalid_certs: bool,
    ) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            timeout: request_timeout,
            accept_invalid_certs,
        };
        let rest = RestClient::new(url.as_str(), api_key, &transport)?;
        let realtime = RealtimeClient::new(url.as_str(), api_key)?;
        debug!(url = %url, "remote source ready");
        Ok(Self {
            rest,
            realtime,
            request_timeout,
        })
    }

    /// Assemble from prebuilt clients.
    pub fn from_parts(rest: RestClient, realtime: RealtimeClient, request_timeout: Duration) -> Self {
        Self {
            rest,
            realtime,
            request_timeout,
        }
    }
}

impl DataSource for RemoteSource {
    fn kind(&self) -> &'static str {
        "remote"
    }

    fn select<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<Vec<Row>, CoreError>> {
        with_timeout(self.request_timeout, async move {
            let order = Resource::from_table(table).and_then(Resource::order);
            self.rest.select(table, order).await.map_err(CoreError::from)
        })
        .boxed()
    }

    fn insert<'a>(&'a self, table: &'a str, row: Row) -> BoxFuture<'a, Result<Row, CoreError>> {
        with_timeout(self.request_timeout, async move {
            self.rest.insert(table, &row).await.map_err(CoreError::from)
        })
        .boxed()
    }

    fn update<'a>(
        &'a self,
        table: &'a str,
        id: &'a RowId,
        patch: Row,
    ) -> BoxFuture<'a, Result<Row, CoreError>> {
        with_timeout(self.request_timeout, async move {
            self.rest.update(table, &id.to_string(), &patch).await.map_err(CoreError::from)
        })
        .boxed()
    }

    fn delete<'a>(&'a self, table: &'a str, id: &'a RowId) -> BoxFuture<'a, Result<(), CoreError>> {
        with_timeout(self.request_timeout, async move {
            self.rest.delete(table, &id.to_string()).await.map_err(CoreError::from)
        })
        .boxed()
    }

    fn subscribe(&self, spec: ChannelSpec) -> BoxFuture<'_, Result<FeedHandle, CoreError>> {
        async move { Ok(self.realtime.subscribe(&spec.name, spec.bindings)) }.boxed()
    }
}
