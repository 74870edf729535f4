// ── Realtime session driver ──
//
// One background task per session. It owns the channel handle and the
// state machine, publishes state over a `watch` channel, and hands every
// relevant change to the consumer. Cancelling the session token stops the
// task, tears the channel down, and lands the state in `Disconnected`.

use std::sync::Arc;
use std::time::Duration;

use deskflow_api::{ChangePayload, FeedEvent, FeedHandle};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::machine::{Effect, SessionEvent, SessionMachine, SessionState};
use super::notify::{apply_to_cache, notification_bindings, notification_for};
use crate::config::RealtimeConfig;
use crate::error::CoreError;
use crate::model::{Notification, Rows};
use crate::source::{ChannelSpec, DataSource};
use crate::store::QueryCache;

/// Receives synthesized notifications. Persisting or showing them is up to
/// the consumer.
pub type NotificationConsumer = Arc<dyn Fn(Notification) + Send + Sync>;

/// Handle to a running session. Dropping it stops the session.
pub struct RealtimeSession {
    user_id: String,
    state: watch::Receiver<SessionState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RealtimeSession {
    /// Start a session for `user_id`. The channel opens after the
    /// configured initial delay.
    pub fn start(
        source: Arc<dyn DataSource>,
        cache: Option<QueryCache<Rows>>,
        config: &RealtimeConfig,
        user_id: &str,
        consumer: NotificationConsumer,
    ) -> Result<Self, CoreError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(CoreError::Config {
                message: "a realtime session needs a user id".into(),
            });
        }

        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        let cancel = CancellationToken::new();
        let driver = SessionDriver {
            source,
            cache,
            consumer,
            user_id: user_id.to_owned(),
            channel: ChannelSpec {
                name: format!("{}-{user_id}", config.channel_prefix),
                bindings: notification_bindings(user_id),
            },
            machine: SessionMachine::new(config),
            state: state_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(driver.run());

        Ok(Self {
            user_id: user_id.to_owned(),
            state: state_rx,
            cancel,
            task: Some(task),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Watch state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Wait until the state satisfies `predicate`; returns that state.
    pub async fn wait_until<F>(&self, predicate: F) -> SessionState
    where
        F: FnMut(&SessionState) -> bool,
    {
        let mut state = self.state.clone();
        match state.wait_for(predicate).await {
            Ok(matched) => matched.clone(),
            Err(_) => self.state(),
        }
    }

    /// Cancel any reconnect timer, close the channel, and wait for the
    /// driver to finish.
    pub async fn disconnect(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(user = %self.user_id, error = %e, "realtime task ended abnormally");
            }
        }
    }
}

impl Drop for RealtimeSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Driver task ──────────────────────────────────────────────────────

struct SessionDriver {
    source: Arc<dyn DataSource>,
    cache: Option<QueryCache<Rows>>,
    consumer: NotificationConsumer,
    user_id: String,
    channel: ChannelSpec,
    machine: SessionMachine,
    state: watch::Sender<SessionState>,
    cancel: CancellationToken,
}

impl SessionDriver {
    async fn run(mut self) {
        let mut feed: Option<FeedHandle> = None;
        let mut next = Some(SessionEvent::Enable);

        loop {
            let event = match next.take() {
                Some(event) => event,
                None => match self.next_feed_event(&mut feed).await {
                    Some(event) => event,
                    None => break,
                },
            };

            let transition = self.machine.handle(event);
            if transition.from != transition.to {
                debug!(
                    user = %self.user_id,
                    from = %transition.from,
                    to = %transition.to,
                    "realtime state changed"
                );
                self.state.send_replace(transition.to.clone());
            }

            match transition.effect {
                Effect::Connect { after } => {
                    if !self.pause(after).await {
                        break;
                    }
                    match self.source.subscribe(self.channel.clone()).await {
                        Ok(handle) => feed = Some(handle),
                        Err(e) => {
                            debug!(user = %self.user_id, error = %e, "realtime subscribe failed");
                            next = Some(SessionEvent::ChannelFailed);
                        }
                    }
                }
                Effect::ScheduleReconnect(delay) => {
                    feed = None;
                    info!(
                        user = %self.user_id,
                        attempt = self.machine.attempts(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "realtime reconnect scheduled"
                    );
                    if !self.pause(delay).await {
                        break;
                    }
                    next = Some(SessionEvent::ReconnectDue);
                }
                Effect::Teardown => feed = None,
                Effect::None => {}
            }

            if self.machine.state().is_terminal() {
                break;
            }
        }

        drop(feed);
        if self.cancel.is_cancelled() {
            let transition = self.machine.handle(SessionEvent::Disconnect);
            self.state.send_replace(transition.to);
            debug!(user = %self.user_id, "realtime session closed");
        } else if *self.machine.state() == SessionState::GivenUp {
            warn!(user = %self.user_id, "realtime session gave up after repeated failures");
        }
    }

    /// Next state-machine event from the channel, delivering changes on the
    /// way. `None` once the session is cancelled.
    async fn next_feed_event(&self, feed: &mut Option<FeedHandle>) -> Option<SessionEvent> {
        let Some(handle) = feed.as_mut() else {
            self.cancel.cancelled().await;
            return None;
        };
        loop {
            let event = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return None,
                event = handle.recv() => event,
            };
            match event {
                Some(FeedEvent::Subscribed) => return Some(SessionEvent::Acknowledged),
                Some(FeedEvent::Change(change)) => self.deliver(&change),
                Some(FeedEvent::ChannelError(reason)) => {
                    debug!(user = %self.user_id, %reason, "realtime channel error");
                    return Some(SessionEvent::ChannelFailed);
                }
                Some(FeedEvent::TimedOut) => {
                    debug!(user = %self.user_id, "realtime join timed out");
                    return Some(SessionEvent::ChannelFailed);
                }
                Some(FeedEvent::Closed) | None => {
                    debug!(user = %self.user_id, "realtime channel closed");
                    return Some(SessionEvent::ChannelFailed);
                }
            }
        }
    }

    fn deliver(&self, change: &ChangePayload) {
        if let Some(cache) = &self.cache {
            apply_to_cache(cache, change);
        }
        if let Some(notification) = notification_for(change, &self.user_id) {
            debug!(user = %self.user_id, title = %notification.title, "notification delivered");
            (self.consumer)(notification);
        }
    }

    /// Sleep unless cancelled first. Returns `false` on cancellation.
    async fn pause(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Resource;
    use crate::source::{MockSource, collection_loader};
    use crate::store::{FetchOptions, RetryPolicy};
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::time::{Instant, sleep};

    type Inbox = Arc<Mutex<Vec<Notification>>>;

    fn inbox() -> (Inbox, NotificationConsumer) {
        let inbox: Inbox = Arc::default();
        let sink = Arc::clone(&inbox);
        let consumer: NotificationConsumer =
            Arc::new(move |n| sink.lock().unwrap().push(n));
        (inbox, consumer)
    }

    fn row(value: serde_json::Value) -> deskflow_api::Row {
        value.as_object().cloned().unwrap()
    }

    fn start(mock: &Arc<MockSource>, user: &str, consumer: NotificationConsumer) -> RealtimeSession {
        RealtimeSession::start(
            mock.clone(),
            None,
            &RealtimeConfig::default(),
            user,
            consumer,
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn connects_after_initial_delay() {
        let mock = Arc::new(MockSource::seeded());
        let (_, consumer) = inbox();
        let started = Instant::now();
        let session = start(&mock, "tech-1", consumer);

        session.wait_until(|s| *s == SessionState::Connected).await;
        assert_eq!(started.elapsed(), Duration::from_millis(500));
        assert_eq!(mock.subscriptions_opened(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_channel_backs_off_then_gives_up() {
        let mock = Arc::new(MockSource::seeded());
        mock.fail_subscriptions(usize::MAX);
        let (_, consumer) = inbox();
        let started = Instant::now();
        let session = start(&mock, "tech-1", consumer);

        let state = session.wait_until(|s| *s == SessionState::GivenUp).await;
        assert_eq!(state, SessionState::GivenUp);
        // 500ms initial delay, then 1s + 2s + 4s + 8s + 16s of backoff.
        assert_eq!(started.elapsed(), Duration::from_millis(31_500));
        assert_eq!(mock.subscriptions_opened(), 6);

        sleep(Duration::from_secs(120)).await;
        assert_eq!(mock.subscriptions_opened(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_channel_reconnects() {
        let mock = Arc::new(MockSource::seeded());
        let (_, consumer) = inbox();
        let session = start(&mock, "tech-1", consumer);
        session.wait_until(|s| *s == SessionState::Connected).await;

        mock.interrupt_feeds("network down");
        let state = session
            .wait_until(|s| matches!(s, SessionState::Reconnecting { .. }))
            .await;
        assert_eq!(
            state,
            SessionState::Reconnecting {
                attempt: 1,
                delay: Duration::from_secs(1)
            }
        );

        session.wait_until(|s| *s == SessionState::Connected).await;
        assert_eq!(mock.subscriptions_opened(), 2);
        assert_eq!(mock.active_subscriptions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn relevant_changes_become_notifications() {
        let mock = Arc::new(MockSource::seeded());
        let (inbox, consumer) = inbox();
        let session = start(&mock, "tech-1", consumer);
        session.wait_until(|s| *s == SessionState::Connected).await;

        mock.insert("tickets", row(json!({ "id": "t-9", "title": "Server room hot" })))
            .await
            .unwrap();
        mock.update("tickets", &"t-1".into(), row(json!({ "status": "resolved" })))
            .await
            .unwrap();
        mock.update("tickets", &"t-2".into(), row(json!({ "status": "closed" })))
            .await
            .unwrap();
        mock.insert("clients", row(json!({ "id": "c-9", "name": "Hooli" })))
            .await
            .unwrap();
        sleep(Duration::from_millis(10)).await;

        let received = inbox.lock().unwrap().clone();
        let titles: Vec<_> = received.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["New ticket", "Ticket updated", "New client"]);
        assert!(received.iter().all(|n| n.user_id == "tech-1" && !n.read));
        assert_eq!(received[1].link, "/tickets/t-1");
    }

    #[tokio::test(start_paused = true)]
    async fn changes_update_cached_collections() {
        let mock = Arc::new(MockSource::seeded());
        let cache = QueryCache::new(RetryPolicy::default(), FetchOptions::default());
        cache
            .fetch_with(
                &Resource::Clients.key(),
                collection_loader(mock.clone(), Resource::Clients),
                FetchOptions::default(),
            )
            .await
            .unwrap();
        let (_, consumer) = inbox();
        let session = RealtimeSession::start(
            mock.clone(),
            Some(cache.clone()),
            &RealtimeConfig::default(),
            "tech-1",
            consumer,
        )
        .unwrap();
        session.wait_until(|s| *s == SessionState::Connected).await;

        mock.insert("clients", row(json!({ "id": "c-9", "name": "Hooli" })))
            .await
            .unwrap();
        sleep(Duration::from_millis(10)).await;

        assert_eq!(cache.data(&Resource::Clients.key()).unwrap().len(), 5);
        assert_eq!(mock.select_count("clients"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_tears_down_channel() {
        let mock = Arc::new(MockSource::seeded());
        let (_, consumer) = inbox();
        let mut session = start(&mock, "tech-1", consumer);
        session.wait_until(|s| *s == SessionState::Connected).await;

        session.disconnect().await;
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(mock.active_subscriptions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_during_initial_delay_never_connects() {
        let mock = Arc::new(MockSource::seeded());
        let (_, consumer) = inbox();
        let mut session = start(&mock, "tech-1", consumer);
        sleep(Duration::from_millis(100)).await;
        session.disconnect().await;
        sleep(Duration::from_secs(5)).await;
        assert_eq!(mock.subscriptions_opened(), 0);
    }

    #[tokio::test]
    async fn blank_user_is_rejected() {
        let mock = Arc::new(MockSource::seeded());
        let (_, consumer) = inbox();
        let result = RealtimeSession::start(
            mock,
            None,
            &RealtimeConfig::default(),
            "  ",
            consumer,
        );
        assert!(matches!(result, Err(CoreError::Config { .. })));
    }
}
