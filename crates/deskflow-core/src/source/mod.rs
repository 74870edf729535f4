// ── Data sources ──
//
// Everything above this module talks to a `DataSource`: row CRUD per table
// plus a change-feed subscription. Which one backs a client is decided by
// `SourceConfig` at construction time.

mod disabled;
mod mock;
mod remote;
mod seed;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use deskflow_api::{ChangeBinding, FeedHandle, Row};
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::CoreError;
use crate::model::{Record, Resource, RowId, Rows};
use crate::store::Loader;

pub use disabled::DisabledSource;
pub use mock::MockSource;
pub use seed::sample_tables;
pub use remote::RemoteSource;

/// A change-feed channel to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub name: String,
    pub bindings: Vec<ChangeBinding>,
}

/// Row-level CRUD over named tables plus a change feed.
pub trait DataSource: Send + Sync {
    /// Short name for logs and `describe` output.
    fn kind(&self) -> &'static str;

    fn select<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<Vec<Row>, CoreError>>;

    /// Insert a row; returns the stored row.
    fn insert<'a>(&'a self, table: &'a str, row: Row) -> BoxFuture<'a, Result<Row, CoreError>>;

    /// Patch one row by id; returns the stored row.
    fn update<'a>(
        &'a self,
        table: &'a str,
        id: &'a RowId,
        patch: Row,
    ) -> BoxFuture<'a, Result<Row, CoreError>>;

    fn delete<'a>(&'a self, table: &'a str, id: &'a RowId) -> BoxFuture<'a, Result<(), CoreError>>;

    /// Open a channel. The handle reports `Subscribed` once the join is
    /// acknowledged; reconnecting is the caller's business.
    fn subscribe(&self, spec: ChannelSpec) -> BoxFuture<'_, Result<FeedHandle, CoreError>>;
}

/// Loader that selects a whole table and decodes it into records.
pub fn collection_loader(source: Arc<dyn DataSource>, resource: Resource) -> Loader<Rows> {
    Arc::new(move || {
        let source = Arc::clone(&source);
        async move {
            let rows = source.select(resource.table()).await?;
            let records = rows
                .into_iter()
                .map(Record::from_row)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Arc::new(records))
        }
        .boxed()
    })
}

/// Bound a remote call, failing with [`CoreError::Timeout`] past `limit`.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, CoreError>
where
    F: Future<Output = Result<T, CoreError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .unwrap_or_else(|_| {
            Err(CoreError::Timeout {
                timeout_secs: limit.as_secs(),
            })
        })
}
