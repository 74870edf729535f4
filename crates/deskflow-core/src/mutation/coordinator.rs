// ── Mutation coordinator ──

use std::sync::Arc;

use deskflow_api::Row;
use tracing::{info, warn};

use super::patch::{remove_record, upsert_record};
use super::{MutationIntent, MutationOutcome, Operation, Patch};
use crate::error::CoreError;
use crate::model::{Record, Resource, Rows};
use crate::source::DataSource;
use crate::store::{InvalidateMode, QueryCache, RetryPolicy, retry_with};

/// Runs confirmed writes and keeps the cache in step with them.
#[derive(Clone)]
pub struct MutationCoordinator {
    source: Arc<dyn DataSource>,
    cache: QueryCache<Rows>,
    retry: RetryPolicy,
}

impl MutationCoordinator {
    pub fn new(source: Arc<dyn DataSource>, cache: QueryCache<Rows>, retry: RetryPolicy) -> Self {
        Self {
            source,
            cache,
            retry,
        }
    }

    /// Write remotely, then patch the cached collection.
    ///
    /// On success the resource key is marked stale without refetching
    /// mounted consumers, and dependent resources are refetched if observed.
    /// On failure the cache is left as it was.
    pub async fn mutate(&self, intent: MutationIntent) -> Result<MutationOutcome, CoreError> {
        let MutationIntent {
            resource,
            operation,
            payload,
            optimistic_patch,
        } = intent;
        let label = format!("{operation} {}", resource.table());

        let record = retry_with(&self.retry, &label, || {
            self.write(resource, &operation, payload.clone())
        })
        .await
        .inspect_err(|e| warn!(resource = %resource, %operation, error = %e, "mutation failed"))?;

        self.apply(resource, &operation, record.as_ref(), optimistic_patch.as_ref());
        info!(resource = %resource, %operation, "mutation applied");

        Ok(MutationOutcome {
            resource,
            operation,
            record,
        })
    }

    async fn write(
        &self,
        resource: Resource,
        operation: &Operation,
        payload: Row,
    ) -> Result<Option<Record>, CoreError> {
        let table = resource.table();
        match operation {
            Operation::Insert => {
                let row = self.source.insert(table, payload).await?;
                Record::from_row(row).map(Some)
            }
            Operation::Update(id) => {
                let row = self.source.update(table, id, payload).await?;
                Record::from_row(row).map(Some)
            }
            Operation::Delete(id) => {
                self.source.delete(table, id).await?;
                Ok(None)
            }
        }
    }

    fn apply(
        &self,
        resource: Resource,
        operation: &Operation,
        record: Option<&Record>,
        patch: Option<&Patch>,
    ) {
        let key = resource.key();
        self.cache.set_data(&key, |old| {
            let old = old?;
            let next = match (patch, operation, record) {
                (Some(patch), _, _) => patch(old, record),
                (None, Operation::Delete(id), _) => remove_record(old, id),
                (None, _, Some(record)) => upsert_record(old, record),
                (None, _, None) => return None,
            };
            Some(Arc::new(next))
        });
        self.cache.invalidate(&key, InvalidateMode::None);

        for dependent in resource.dependents() {
            self.cache
                .invalidate(&dependent.key(), InvalidateMode::ActiveOnly);
        }
    }
}
