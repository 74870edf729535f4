// ── Realtime notifications ──
//
// A per-user change-feed subscription. `SessionMachine` is the pure state
// machine, `RealtimeSession` runs it against a data source, and
// `RealtimeManager` keeps at most one session alive for the current user.

pub mod machine;
pub mod notify;
pub mod session;

use std::sync::Arc;

use tracing::debug;

use crate::config::RealtimeConfig;
use crate::error::CoreError;
use crate::model::Rows;
use crate::source::DataSource;
use crate::store::QueryCache;

pub use machine::{Effect, SessionEvent, SessionMachine, SessionState, Transition};
pub use notify::{apply_to_cache, notification_bindings, notification_for};
pub use session::{NotificationConsumer, RealtimeSession};

/// Owns the current user's session.
///
/// Reconfiguring with the same user and the same consumer keeps the running
/// session. Any other change fully tears the old session down before a new
/// one starts, so two sessions never overlap.
pub struct RealtimeManager {
    source: Arc<dyn DataSource>,
    cache: Option<QueryCache<Rows>>,
    config: RealtimeConfig,
    current: Option<Active>,
}

struct Active {
    session: RealtimeSession,
    consumer: NotificationConsumer,
}

impl RealtimeManager {
    pub fn new(
        source: Arc<dyn DataSource>,
        cache: Option<QueryCache<Rows>>,
        config: RealtimeConfig,
    ) -> Self {
        Self {
            source,
            cache,
            config,
            current: None,
        }
    }

    /// Apply the current inputs. A session runs only when `enabled` is set
    /// and both a user id and a consumer are present.
    pub async fn reconfigure(
        &mut self,
        enabled: bool,
        user_id: Option<&str>,
        consumer: Option<NotificationConsumer>,
    ) -> Result<(), CoreError> {
        let wanted = match (enabled, user_id.map(str::trim), consumer) {
            (true, Some(user), Some(consumer)) if !user.is_empty() => Some((user, consumer)),
            _ => None,
        };

        let unchanged = match (&self.current, &wanted) {
            (Some(active), Some((user, consumer))) => {
                active.session.user_id() == *user && Arc::ptr_eq(&active.consumer, consumer)
            }
            _ => false,
        };
        if unchanged {
            return Ok(());
        }

        self.stop().await;
        if let Some((user, consumer)) = wanted {
            self.start(user, consumer)?;
        }
        Ok(())
    }

    /// Tear the current session down and start it again with the same
    /// inputs. The only way out of `GivenUp`.
    pub async fn restart(&mut self) -> Result<(), CoreError> {
        let Some(active) = self.current.take() else {
            return Ok(());
        };
        let Active {
            mut session,
            consumer,
        } = active;
        let user = session.user_id().to_owned();
        session.disconnect().await;
        self.start(&user, consumer)
    }

    /// Disconnect and forget the current session.
    pub async fn stop(&mut self) {
        if let Some(mut active) = self.current.take() {
            debug!(user = %active.session.user_id(), "stopping realtime session");
            active.session.disconnect().await;
        }
    }

    /// State of the current session; `Disconnected` when there is none.
    pub fn state(&self) -> SessionState {
        self.current
            .as_ref()
            .map_or(SessionState::Disconnected, |a| a.session.state())
    }

    pub fn session(&self) -> Option<&RealtimeSession> {
        self.current.as_ref().map(|a| &a.session)
    }

    fn start(&mut self, user_id: &str, consumer: NotificationConsumer) -> Result<(), CoreError> {
        let session = RealtimeSession::start(
            Arc::clone(&self.source),
            self.cache.clone(),
            &self.config,
            user_id,
            Arc::clone(&consumer),
        )?;
        self.current = Some(Active { session, consumer });
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::source::MockSource;
    use std::time::Duration;
    use tokio::time::sleep;

    fn consumer() -> NotificationConsumer {
        Arc::new(|_| {})
    }

    fn manager(mock: &Arc<MockSource>) -> RealtimeManager {
        RealtimeManager::new(mock.clone(), None, RealtimeConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn same_inputs_keep_the_session() {
        let mock = Arc::new(MockSource::seeded());
        let mut manager = manager(&mock);
        let consumer = consumer();

        manager
            .reconfigure(true, Some("tech-1"), Some(consumer.clone()))
            .await
            .unwrap();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(manager.state(), SessionState::Connected);

        manager
            .reconfigure(true, Some("tech-1"), Some(consumer))
            .await
            .unwrap();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(mock.subscriptions_opened(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn changed_user_replaces_the_session() {
        let mock = Arc::new(MockSource::seeded());
        let mut manager = manager(&mock);
        let consumer = consumer();

        manager
            .reconfigure(true, Some("tech-1"), Some(consumer.clone()))
            .await
            .unwrap();
        sleep(Duration::from_secs(1)).await;

        manager
            .reconfigure(true, Some("tech-2"), Some(consumer))
            .await
            .unwrap();
        assert_eq!(mock.active_subscriptions(), 0);
        assert_eq!(manager.session().unwrap().user_id(), "tech-2");

        sleep(Duration::from_secs(1)).await;
        assert_eq!(mock.subscriptions_opened(), 2);
        assert_eq!(mock.active_subscriptions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn new_consumer_restarts_the_session() {
        let mock = Arc::new(MockSource::seeded());
        let mut manager = manager(&mock);

        manager
            .reconfigure(true, Some("tech-1"), Some(consumer()))
            .await
            .unwrap();
        sleep(Duration::from_secs(1)).await;
        manager
            .reconfigure(true, Some("tech-1"), Some(consumer()))
            .await
            .unwrap();
        sleep(Duration::from_secs(1)).await;

        assert_eq!(mock.subscriptions_opened(), 2);
        assert_eq!(mock.active_subscriptions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_inputs_disconnect() {
        let mock = Arc::new(MockSource::seeded());
        let mut manager = manager(&mock);

        manager
            .reconfigure(true, Some("tech-1"), Some(consumer()))
            .await
            .unwrap();
        sleep(Duration::from_secs(1)).await;

        manager.reconfigure(true, None, Some(consumer())).await.unwrap();
        assert_eq!(manager.state(), SessionState::Disconnected);
        assert_eq!(mock.active_subscriptions(), 0);

        manager
            .reconfigure(false, Some("tech-1"), Some(consumer()))
            .await
            .unwrap();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(mock.subscriptions_opened(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_leaves_given_up() {
        let mock = Arc::new(MockSource::seeded());
        mock.fail_subscriptions(6);
        let mut manager = manager(&mock);

        manager
            .reconfigure(true, Some("tech-1"), Some(consumer()))
            .await
            .unwrap();
        manager
            .session()
            .unwrap()
            .wait_until(|s| *s == SessionState::GivenUp)
            .await;

        manager.restart().await.unwrap();
        manager
            .session()
            .unwrap()
            .wait_until(|s| *s == SessionState::Connected)
            .await;
        assert_eq!(mock.subscriptions_opened(), 7);
    }
}
