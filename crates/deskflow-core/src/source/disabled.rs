// ── Unconfigured backend ──

use deskflow_api::{FeedHandle, Row};
use futures::FutureExt;
use futures::future::BoxFuture;

use super::{ChannelSpec, DataSource};
use crate::error::CoreError;
use crate::model::RowId;

/// Stand-in when no backend is configured and the mock is not wanted.
/// Every call fails with [`CoreError::NotConfigured`], which is never retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSource;

impl DataSource for DisabledSource {
    fn kind(&self) -> &'static str {
        "disabled"
    }

    fn select<'a>(&'a self, _table: &'a str) -> BoxFuture<'a, Result<Vec<Row>, CoreError>> {
        async { Err(CoreError::NotConfigured) }.boxed()
    }

    fn insert<'a>(&'a self, _table: &'a str, _row: Row) -> BoxFuture<'a, Result<Row, CoreError>> {
        async { Err(CoreError::NotConfigured) }.boxed()
    }

    fn update<'a>(
        &'a self,
        _table: &'a str,
        _id: &'a RowId,
        _patch: Row,
    ) -> BoxFuture<'a, Result<Row, CoreError>> {
        async { Err(CoreError::NotConfigured) }.boxed()
    }

    fn delete<'a>(&'a self, _table: &'a str, _id: &'a RowId) -> BoxFuture<'a, Result<(), CoreError>> {
        async { Err(CoreError::NotConfigured) }.boxed()
    }

    fn subscribe(&self, _spec: ChannelSpec) -> BoxFuture<'_, Result<FeedHandle, CoreError>> {
        async { Err(CoreError::NotConfigured) }.boxed()
    }
}
