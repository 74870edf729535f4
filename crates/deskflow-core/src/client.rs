// ── Sync client facade ──
//
// Wires the data source, query cache, mutation coordinator, prefetcher,
// and realtime sessions together behind one cheaply cloneable handle.

use std::sync::{Arc, Mutex, PoisonError};

use deskflow_api::Row;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{SourceConfig, SyncConfig};
use crate::error::CoreError;
use crate::model::{
    Article, Category, Client, ClientDraft, Entity, Resource, RowId, Rows, Technician, Ticket,
    TicketDraft, TicketStatus, decode_all, to_row,
};
use crate::mutation::{MutationCoordinator, MutationIntent, MutationOutcome};
use crate::prefetch::PrefetchScheduler;
use crate::realtime::{NotificationConsumer, RealtimeManager, RealtimeSession};
use crate::source::{DataSource, DisabledSource, MockSource, RemoteSource, collection_loader};
use crate::store::{InvalidateMode, QueryCache, QueryObserver};

/// Entry point for UI code.
///
/// Cheaply cloneable via `Arc<SyncClientInner>`. Every read goes through
/// the shared [`QueryCache`]; every write through the
/// [`MutationCoordinator`].
#[derive(Clone)]
pub struct SyncClient {
    inner: Arc<SyncClientInner>,
}

struct SyncClientInner {
    config: SyncConfig,
    source: Arc<dyn DataSource>,
    cache: QueryCache<Rows>,
    mutations: MutationCoordinator,
    prefetch: PrefetchScheduler,
    cancel: CancellationToken,
    gc_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for SyncClientInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl SyncClient {
    /// Build a client for the source named in `config`.
    pub fn new(config: SyncConfig) -> Result<Self, CoreError> {
        let source: Arc<dyn DataSource> = match &config.source {
            SourceConfig::Remote { url, api_key } => Arc::new(RemoteSource::new(
                url,
                api_key,
                config.request_timeout,
                config.accept_invalid_certs,
            )?),
            SourceConfig::Mock => Arc::new(MockSource::seeded()),
            SourceConfig::Disabled => Arc::new(DisabledSource),
        };
        Ok(Self::with_source(config, source))
    }

    /// Build a client around an existing source. The `source` field of
    /// `config` is ignored.
    pub fn with_source(config: SyncConfig, source: Arc<dyn DataSource>) -> Self {
        let options = config.cache.fetch_options();
        let cache = QueryCache::new(config.cache.retry, options);
        let mutations = MutationCoordinator::new(
            Arc::clone(&source),
            cache.clone(),
            config.cache.mutation_retry,
        );
        let prefetch = PrefetchScheduler::new(
            cache.clone(),
            Arc::clone(&source),
            config.prefetch.clone(),
            options,
        );
        info!(source = source.kind(), "sync client ready");

        Self {
            inner: Arc::new(SyncClientInner {
                config,
                source,
                cache,
                mutations,
                prefetch,
                cancel: CancellationToken::new(),
                gc_task: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// `"remote"`, `"mock"`, or `"disabled"`.
    pub fn source_kind(&self) -> &'static str {
        self.inner.source.kind()
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.inner.source
    }

    pub fn cache(&self) -> &QueryCache<Rows> {
        &self.inner.cache
    }

    /// Start the background sweeper that evicts expired cache entries.
    /// Calling it again is a no-op.
    pub fn start_gc(&self) {
        let mut task = self
            .inner
            .gc_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return;
        }
        let interval = self.inner.config.cache.gc_interval;
        debug!(interval_secs = interval.as_secs(), "cache sweeper started");
        *task = Some(
            self.inner
                .cache
                .spawn_gc(interval, self.inner.cancel.child_token()),
        );
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Rows of `resource`, from the cache when fresh.
    pub async fn fetch(&self, resource: Resource) -> Result<Rows, CoreError> {
        let loader = collection_loader(Arc::clone(&self.inner.source), resource);
        self.inner
            .cache
            .fetch_with(&resource.key(), loader, self.inner.cache.defaults())
            .await
    }

    /// Typed rows of `E`'s resource.
    pub async fn list<E: Entity>(&self) -> Result<Vec<E>, CoreError> {
        let rows = self.fetch(E::RESOURCE).await?;
        decode_all(&rows)
    }

    pub async fn clients(&self) -> Result<Vec<Client>, CoreError> {
        self.list().await
    }

    pub async fn tickets(&self) -> Result<Vec<Ticket>, CoreError> {
        self.list().await
    }

    pub async fn technicians(&self) -> Result<Vec<Technician>, CoreError> {
        self.list().await
    }

    pub async fn articles(&self) -> Result<Vec<Article>, CoreError> {
        self.list().await
    }

    pub async fn categories(&self) -> Result<Vec<Category>, CoreError> {
        self.list().await
    }

    /// Mount a consumer of `resource`. The entry stays alive and is
    /// refetched on invalidation while the observer lives.
    pub fn observe(&self, resource: Resource) -> QueryObserver<Rows> {
        let loader = collection_loader(Arc::clone(&self.inner.source), resource);
        self.inner
            .cache
            .observe(&resource.key(), loader, self.inner.cache.defaults())
    }

    // ── Cache invalidation ───────────────────────────────────────────

    /// Mark `resource` stale and refetch it if observed.
    pub fn invalidate(&self, resource: Resource) -> usize {
        self.inner
            .cache
            .invalidate(&resource.key(), InvalidateMode::ActiveOnly)
    }

    /// Mark everything stale and refetch what is observed.
    pub fn invalidate_all(&self) -> usize {
        self.inner.cache.invalidate_all(InvalidateMode::ActiveOnly)
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.inner.cache.clear();
    }

    // ── Mutations ────────────────────────────────────────────────────

    pub async fn mutate(&self, intent: MutationIntent) -> Result<MutationOutcome, CoreError> {
        self.inner.mutations.mutate(intent).await
    }

    /// Insert a row into `E`'s resource and return it as stored.
    pub async fn insert<E: Entity>(&self, payload: Row) -> Result<E, CoreError> {
        let outcome = self
            .mutate(MutationIntent::insert(E::RESOURCE, payload))
            .await?;
        stored(outcome)
    }

    /// Patch one row of `E`'s resource and return it as stored.
    pub async fn update<E: Entity>(&self, id: &RowId, payload: Row) -> Result<E, CoreError> {
        let outcome = self
            .mutate(MutationIntent::update(E::RESOURCE, id.clone(), payload))
            .await?;
        stored(outcome)
    }

    pub async fn delete<E: Entity>(&self, id: &RowId) -> Result<(), CoreError> {
        self.mutate(MutationIntent::delete(E::RESOURCE, id.clone()))
            .await
            .map(|_| ())
    }

    pub async fn create_client(&self, draft: &ClientDraft) -> Result<Client, CoreError> {
        require(draft.name.as_deref(), "client name")?;
        self.insert(to_row(draft)?).await
    }

    pub async fn update_client(&self, id: &RowId, draft: &ClientDraft) -> Result<Client, CoreError> {
        self.update(id, to_row(draft)?).await
    }

    pub async fn delete_client(&self, id: &RowId) -> Result<(), CoreError> {
        self.delete::<Client>(id).await
    }

    pub async fn create_ticket(&self, draft: &TicketDraft) -> Result<Ticket, CoreError> {
        require(draft.title.as_deref(), "ticket title")?;
        self.insert(to_row(draft)?).await
    }

    pub async fn update_ticket(&self, id: &RowId, draft: &TicketDraft) -> Result<Ticket, CoreError> {
        self.update(id, to_row(draft)?).await
    }

    /// Assign a ticket to a technician, or unassign it with `None`.
    pub async fn assign_ticket(
        &self,
        id: &RowId,
        technician: Option<&RowId>,
    ) -> Result<Ticket, CoreError> {
        let assignee = technician.map_or(Value::Null, RowId::to_value);
        self.update(id, to_row(&json!({ "assigned_to": assignee }))?)
            .await
    }

    pub async fn set_ticket_status(
        &self,
        id: &RowId,
        status: TicketStatus,
    ) -> Result<Ticket, CoreError> {
        self.update(id, to_row(&json!({ "status": status }))?).await
    }

    pub async fn delete_ticket(&self, id: &RowId) -> Result<(), CoreError> {
        self.delete::<Ticket>(id).await
    }

    // ── Prefetch and realtime ────────────────────────────────────────

    pub fn prefetch(&self) -> &PrefetchScheduler {
        &self.inner.prefetch
    }

    /// Start a notification session for `user_id`. Changes are also folded
    /// into the cache.
    pub fn realtime(
        &self,
        user_id: &str,
        consumer: NotificationConsumer,
    ) -> Result<RealtimeSession, CoreError> {
        RealtimeSession::start(
            Arc::clone(&self.inner.source),
            Some(self.inner.cache.clone()),
            &self.inner.config.realtime,
            user_id,
            consumer,
        )
    }

    /// A manager that keeps one session alive across user changes.
    pub fn realtime_manager(&self) -> RealtimeManager {
        RealtimeManager::new(
            Arc::clone(&self.inner.source),
            Some(self.inner.cache.clone()),
            self.inner.config.realtime.clone(),
        )
    }

    /// Stop background work: the cache sweeper and pending prefetch timers.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.prefetch.shutdown();
        debug!("sync client shut down");
    }
}

fn stored<E: Entity>(outcome: MutationOutcome) -> Result<E, CoreError> {
    outcome
        .record
        .ok_or_else(|| CoreError::Internal("write returned no row".into()))?
        .decode()
}

fn require(value: Option<&str>, what: &str) -> Result<(), CoreError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(()),
        _ => Err(CoreError::InvalidRecord {
            message: format!("{what} is required"),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Notification;
    use crate::realtime::SessionState;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::time::sleep;

    fn mock_client() -> (SyncClient, Arc<MockSource>) {
        let mock = Arc::new(MockSource::seeded());
        let client = SyncClient::with_source(SyncConfig::mock(), mock.clone());
        (client, mock)
    }

    #[tokio::test]
    async fn builds_each_source_kind() {
        assert_eq!(SyncClient::new(SyncConfig::mock()).unwrap().source_kind(), "mock");
        let disabled = SyncClient::new(SyncConfig::default()).unwrap();
        assert_eq!(disabled.source_kind(), "disabled");
        assert!(matches!(
            disabled.clients().await.unwrap_err(),
            CoreError::NotConfigured
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn typed_reads_share_the_cache() {
        let (client, mock) = mock_client();

        let tickets = client.tickets().await.unwrap();
        assert_eq!(tickets.len(), 5);
        client.tickets().await.unwrap();
        client.fetch(Resource::Tickets).await.unwrap();
        assert_eq!(mock.select_count("tickets"), 1);

        client.invalidate(Resource::Tickets);
        client.tickets().await.unwrap();
        assert_eq!(mock.select_count("tickets"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn ticket_workflow_updates_cached_list() {
        let (client, _) = mock_client();
        client.tickets().await.unwrap();

        let created = client
            .create_ticket(&TicketDraft {
                title: Some("Projector flickers".into()),
                ..TicketDraft::default()
            })
            .await
            .unwrap();
        assert_eq!(created.status, TicketStatus::Open);

        let assigned = client
            .assign_ticket(&created.id, Some(&RowId::from("tech-2")))
            .await
            .unwrap();
        assert_eq!(assigned.assigned_to, Some(RowId::from("tech-2")));

        client
            .set_ticket_status(&created.id, TicketStatus::InProgress)
            .await
            .unwrap();
        let cached = client.cache().data(&Resource::Tickets.key()).unwrap();
        let ticket: Ticket = cached
            .iter()
            .find(|r| r.id == created.id)
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(ticket.status, TicketStatus::InProgress);

        let unassigned = client.assign_ticket(&created.id, None).await.unwrap();
        assert!(unassigned.assigned_to.is_none());

        client.delete_ticket(&created.id).await.unwrap();
        assert_eq!(client.cache().data(&Resource::Tickets.key()).unwrap().len(), 5);
    }

    #[tokio::test]
    async fn blank_names_are_rejected_before_writing() {
        let (client, mock) = mock_client();
        let err = client
            .create_client(&ClientDraft {
                name: Some("  ".into()),
                ..ClientDraft::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRecord { .. }));
        assert_eq!(mock.rows("clients").len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn client_rename_refetches_observed_tickets() {
        let (client, mock) = mock_client();
        let tickets = client.observe(Resource::Tickets);
        tickets.fetch().await.unwrap();

        let renamed = client
            .update_client(
                &RowId::from("c-1"),
                &ClientDraft {
                    name: Some("Acme Freight".into()),
                    ..ClientDraft::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Acme Freight");

        tickets.fetch().await.unwrap();
        assert_eq!(mock.select_count("tickets"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn gc_evicts_unobserved_entries() {
        let (client, _) = mock_client();
        client.start_gc();
        client.start_gc();
        client.categories().await.unwrap();
        assert!(client.cache().contains(&Resource::Categories.key()));

        sleep(Duration::from_secs(11 * 60)).await;
        assert!(!client.cache().contains(&Resource::Categories.key()));
        client.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn realtime_session_notifies_and_patches_cache() {
        let (client, mock) = mock_client();
        client.clients().await.unwrap();

        let inbox: Arc<std::sync::Mutex<Vec<Notification>>> = Arc::default();
        let sink = Arc::clone(&inbox);
        let session = client
            .realtime(
                "tech-1",
                Arc::new(move |n| sink.lock().unwrap().push(n)),
            )
            .unwrap();
        session.wait_until(|s| *s == SessionState::Connected).await;

        mock.insert("clients", to_row(&json!({ "name": "Hooli" })).unwrap())
            .await
            .unwrap();
        sleep(Duration::from_millis(10)).await;

        assert_eq!(inbox.lock().unwrap().len(), 1);
        assert_eq!(client.cache().data(&Resource::Clients.key()).unwrap().len(), 5);
    }
}
