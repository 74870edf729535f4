// ── In-memory backend ──
//
// Seeded tables for running without a hosted project. Writes emit change
// events to matching subscriptions, like the real feed. Tests also use it
// to count reads and inject failures.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use deskflow_api::{ChangeBinding, ChangeKind, ChangePayload, FeedEvent, FeedHandle, Row};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use uuid::Uuid;

use super::seed::sample_tables;
use super::{ChannelSpec, DataSource};
use crate::error::CoreError;
use crate::model::RowId;

const FEED_CAPACITY: usize = 64;

struct Subscriber {
    channel: String,
    bindings: Vec<ChangeBinding>,
    events: mpsc::Sender<FeedEvent>,
    cancel: CancellationToken,
}

impl Subscriber {
    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && !self.events.is_closed()
    }
}

#[derive(Default)]
struct MockState {
    tables: HashMap<String, Vec<Row>>,
    selects: HashMap<String, usize>,
    select_failures: HashMap<String, VecDeque<CoreError>>,
    write_failures: VecDeque<CoreError>,
    subscription_failures: usize,
    subscriptions_opened: usize,
    subscribers: Vec<Subscriber>,
}

/// In-memory [`DataSource`].
#[derive(Default)]
pub struct MockSource {
    state: Mutex<MockState>,
    latency: Duration,
}

impl MockSource {
    /// No tables at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sample dashboard data.
    pub fn seeded() -> Self {
        Self::with_tables(sample_tables())
    }

    pub fn with_tables(tables: HashMap<String, Vec<Row>>) -> Self {
        Self {
            state: Mutex::new(MockState {
                tables,
                ..MockState::default()
            }),
            latency: Duration::ZERO,
        }
    }

    /// Delay every read and write by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    // ── Inspection ───────────────────────────────────────────────────

    /// How many times `select` was called for `table`.
    pub fn select_count(&self, table: &str) -> usize {
        self.state().selects.get(table).copied().unwrap_or(0)
    }

    /// Total `select` calls across tables.
    pub fn total_selects(&self) -> usize {
        self.state().selects.values().sum()
    }

    /// How many channels were opened (failed ones included).
    pub fn subscriptions_opened(&self) -> usize {
        self.state().subscriptions_opened
    }

    /// Channels currently open.
    pub fn active_subscriptions(&self) -> usize {
        let mut state = self.state();
        state.subscribers.retain(Subscriber::is_live);
        state.subscribers.len()
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    // ── Failure injection ────────────────────────────────────────────

    /// Fail the next `times` selects on `table` with `error`.
    pub fn fail_selects(&self, table: &str, error: &CoreError, times: usize) {
        let mut state = self.state();
        let queue = state.select_failures.entry(table.to_owned()).or_default();
        queue.extend(std::iter::repeat_n(error.clone(), times));
    }

    /// Fail the next `times` writes (any table) with `error`.
    pub fn fail_writes(&self, error: &CoreError, times: usize) {
        self.state()
            .write_failures
            .extend(std::iter::repeat_n(error.clone(), times));
    }

    /// The next `times` channels report a channel error instead of joining.
    pub fn fail_subscriptions(&self, times: usize) {
        self.state().subscription_failures = times;
    }

    /// Push a change to every matching open channel.
    pub fn emit(&self, change: &ChangePayload) {
        let mut state = self.state();
        state.subscribers.retain(Subscriber::is_live);
        for sub in &state.subscribers {
            if sub.bindings.iter().any(|b| b.matches(change)) {
                trace!(channel = %sub.channel, table = %change.table, kind = %change.kind, "mock change delivered");
                let _ = sub.events.try_send(FeedEvent::Change(change.clone()));
            }
        }
    }

    /// Break every open channel, as a dropped network would.
    pub fn interrupt_feeds(&self, reason: &str) {
        let mut state = self.state();
        for sub in state.subscribers.drain(..) {
            let _ = sub
                .events
                .try_send(FeedEvent::ChannelError(reason.to_owned()));
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    fn take_write_failure(&self) -> Result<(), CoreError> {
        self.state().write_failures.pop_front().map_or(Ok(()), Err)
    }

    fn change(kind: ChangeKind, table: &str, record: Row, old_record: Option<Row>) -> ChangePayload {
        ChangePayload {
            kind,
            schema: "public".into(),
            table: table.to_owned(),
            record,
            old_record,
            commit_timestamp: Some(Utc::now().to_rfc3339()),
        }
    }
}

fn has_id(row: &Row, id: &RowId) -> bool {
    row.get("id").is_some_and(|v| *v == id.to_value())
}

fn not_found(table: &str, id: &RowId) -> CoreError {
    CoreError::NotFound {
        resource: table.to_owned(),
        identifier: id.to_string(),
    }
}

impl DataSource for MockSource {
    fn kind(&self) -> &'static str {
        "mock"
    }

    fn select<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<Vec<Row>, CoreError>> {
        async move {
            let failure = {
                let mut state = self.state();
                *state.selects.entry(table.to_owned()).or_default() += 1;
                state
                    .select_failures
                    .get_mut(table)
                    .and_then(VecDeque::pop_front)
            };
            self.simulate_latency().await;
            if let Some(error) = failure {
                debug!(table, error = %error, "mock select failing");
                return Err(error);
            }
            Ok(self.rows(table))
        }
        .boxed()
    }

    fn insert<'a>(&'a self, table: &'a str, row: Row) -> BoxFuture<'a, Result<Row, CoreError>> {
        async move {
            self.simulate_latency().await;
            self.take_write_failure()?;

            let mut row = row;
            row.entry("id")
                .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
            row.entry("created_at")
                .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));

            self.state()
                .tables
                .entry(table.to_owned())
                .or_default()
                .push(row.clone());
            self.emit(&Self::change(ChangeKind::Insert, table, row.clone(), None));
            Ok(row)
        }
        .boxed()
    }

    fn update<'a>(
        &'a self,
        table: &'a str,
        id: &'a RowId,
        patch: Row,
    ) -> BoxFuture<'a, Result<Row, CoreError>> {
        async move {
            self.simulate_latency().await;
            self.take_write_failure()?;

            let (old, stored) = {
                let mut state = self.state();
                let row = state
                    .tables
                    .get_mut(table)
                    .and_then(|rows| rows.iter_mut().find(|r| has_id(r, id)))
                    .ok_or_else(|| not_found(table, id))?;
                let old = row.clone();
                for (column, value) in patch {
                    if column != "id" {
                        row.insert(column, value);
                    }
                }
                row.insert("updated_at".into(), Value::String(Utc::now().to_rfc3339()));
                (old, row.clone())
            };
            self.emit(&Self::change(
                ChangeKind::Update,
                table,
                stored.clone(),
                Some(old),
            ));
            Ok(stored)
        }
        .boxed()
    }

    fn delete<'a>(&'a self, table: &'a str, id: &'a RowId) -> BoxFuture<'a, Result<(), CoreError>> {
        async move {
            self.simulate_latency().await;
            self.take_write_failure()?;

            let removed = {
                let mut state = self.state();
                let rows = state
                    .tables
                    .get_mut(table)
                    .ok_or_else(|| not_found(table, id))?;
                let index = rows
                    .iter()
                    .position(|r| has_id(r, id))
                    .ok_or_else(|| not_found(table, id))?;
                rows.remove(index)
            };
            self.emit(&Self::change(
                ChangeKind::Delete,
                table,
                Row::new(),
                Some(removed),
            ));
            Ok(())
        }
        .boxed()
    }

    fn subscribe(&self, spec: ChannelSpec) -> BoxFuture<'_, Result<FeedHandle, CoreError>> {
        async move {
            let (events, receiver) = mpsc::channel(FEED_CAPACITY);
            let cancel = CancellationToken::new();

            let mut state = self.state();
            state.subscriptions_opened += 1;
            if state.subscription_failures > 0 {
                state.subscription_failures -= 1;
                debug!(channel = %spec.name, "mock channel failing");
                let _ = events.try_send(FeedEvent::ChannelError("injected channel failure".into()));
            } else {
                debug!(channel = %spec.name, bindings = spec.bindings.len(), "mock channel joined");
                let _ = events.try_send(FeedEvent::Subscribed);
                state.subscribers.push(Subscriber {
                    channel: spec.name,
                    bindings: spec.bindings,
                    events,
                    cancel: cancel.clone(),
                });
            }
            Ok(FeedHandle::new(receiver, cancel))
        }
        .boxed()
    }
}
