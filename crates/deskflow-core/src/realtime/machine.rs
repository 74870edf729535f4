// ── Session state machine ──
//
// Pure transition function for one realtime session. The driver task feeds
// it events and carries out the returned effect; nothing here sleeps or
// touches the network, so every path is unit-testable.

use std::fmt;
use std::time::Duration;

use crate::config::RealtimeConfig;

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting `delay` before reconnect attempt number `attempt`.
    Reconnecting { attempt: u32, delay: Duration },
    /// Retry ceiling reached. Only an explicit restart leaves this state.
    GivenUp,
}

impl SessionState {
    /// Whether the driver has nothing left to do.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::GivenUp)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting { attempt, delay } => {
                write!(f, "reconnecting (attempt {attempt} in {}ms)", delay.as_millis())
            }
            Self::GivenUp => f.write_str("given up"),
        }
    }
}

/// Inputs to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// User id and consumer are present; start connecting.
    Enable,
    /// The server acknowledged the channel join.
    Acknowledged,
    /// Channel error, join timeout, or closed connection.
    ChannelFailed,
    /// The scheduled reconnect delay elapsed.
    ReconnectDue,
    /// Logout, unmount, or a dependency change.
    Disconnect,
}

/// What the driver must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Open the channel after `after`.
    Connect { after: Duration },
    /// Tear down the channel and wake up with `ReconnectDue` after the delay.
    ScheduleReconnect(Duration),
    /// Tear down the channel; the session is over.
    Teardown,
    None,
}

/// Result of feeding one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: SessionState,
    pub to: SessionState,
    pub effect: Effect,
}

#[derive(Debug, Clone)]
pub struct SessionMachine {
    state: SessionState,
    attempts: u32,
    initial_delay: Duration,
    backoff_base: Duration,
    max_attempts: u32,
}

impl SessionMachine {
    pub fn new(config: &RealtimeConfig) -> Self {
        Self {
            state: SessionState::Disconnected,
            attempts: 0,
            initial_delay: config.initial_delay,
            backoff_base: config.backoff_base,
            max_attempts: config.max_attempts,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Consecutive failed attempts since the last acknowledged join.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// `backoff_base * 2^attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base
            .checked_mul(2u32.saturating_pow(attempt))
            .unwrap_or(Duration::MAX)
    }

    pub fn handle(&mut self, event: SessionEvent) -> Transition {
        let from = self.state.clone();
        let (to, effect) = match (&self.state, event) {
            (_, SessionEvent::Disconnect) => {
                self.attempts = 0;
                let effect = if self.state == SessionState::Disconnected {
                    Effect::None
                } else {
                    Effect::Teardown
                };
                (SessionState::Disconnected, effect)
            }
            (SessionState::Disconnected, SessionEvent::Enable) => {
                self.attempts = 0;
                (
                    SessionState::Connecting,
                    Effect::Connect {
                        after: self.initial_delay,
                    },
                )
            }
            (SessionState::Connecting, SessionEvent::Acknowledged) => {
                self.attempts = 0;
                (SessionState::Connected, Effect::None)
            }
            (SessionState::Connecting | SessionState::Connected, SessionEvent::ChannelFailed) => {
                if self.attempts >= self.max_attempts {
                    (SessionState::GivenUp, Effect::Teardown)
                } else {
                    let delay = self.backoff(self.attempts);
                    self.attempts += 1;
                    (
                        SessionState::Reconnecting {
                            attempt: self.attempts,
                            delay,
                        },
                        Effect::ScheduleReconnect(delay),
                    )
                }
            }
            (SessionState::Reconnecting { .. }, SessionEvent::ReconnectDue) => (
                SessionState::Connecting,
                Effect::Connect {
                    after: Duration::ZERO,
                },
            ),
            (state, _) => (state.clone(), Effect::None),
        };
        self.state = to.clone();
        Transition { from, to, effect }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn machine() -> SessionMachine {
        SessionMachine::new(&RealtimeConfig::default())
    }

    #[test]
    fn enable_connects_after_initial_delay() {
        let mut m = machine();
        let t = m.handle(SessionEvent::Enable);
        assert_eq!(t.to, SessionState::Connecting);
        assert_eq!(
            t.effect,
            Effect::Connect {
                after: Duration::from_millis(500)
            }
        );
        let t = m.handle(SessionEvent::Acknowledged);
        assert_eq!(t.to, SessionState::Connected);
        assert_eq!(t.effect, Effect::None);
    }

    #[test]
    fn consecutive_failures_back_off_then_give_up() {
        let mut m = machine();
        m.handle(SessionEvent::Enable);

        let mut delays = Vec::new();
        for _ in 0..5 {
            let t = m.handle(SessionEvent::ChannelFailed);
            match t.effect {
                Effect::ScheduleReconnect(delay) => delays.push(delay.as_millis()),
                other => panic!("expected reconnect, got {other:?}"),
            }
            let t = m.handle(SessionEvent::ReconnectDue);
            assert_eq!(t.to, SessionState::Connecting);
        }
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);

        let t = m.handle(SessionEvent::ChannelFailed);
        assert_eq!(t.to, SessionState::GivenUp);
        assert_eq!(t.effect, Effect::Teardown);

        // Nothing revives a given-up session except an explicit disconnect.
        assert_eq!(m.handle(SessionEvent::ReconnectDue).effect, Effect::None);
        assert_eq!(m.handle(SessionEvent::Enable).effect, Effect::None);
        assert_eq!(m.state(), &SessionState::GivenUp);
    }

    #[test]
    fn acknowledgement_resets_attempts() {
        let mut m = machine();
        m.handle(SessionEvent::Enable);
        m.handle(SessionEvent::ChannelFailed);
        m.handle(SessionEvent::ReconnectDue);
        m.handle(SessionEvent::ChannelFailed);
        assert_eq!(m.attempts(), 2);
        m.handle(SessionEvent::ReconnectDue);
        m.handle(SessionEvent::Acknowledged);
        assert_eq!(m.attempts(), 0);

        let t = m.handle(SessionEvent::ChannelFailed);
        assert_eq!(
            t.to,
            SessionState::Reconnecting {
                attempt: 1,
                delay: Duration::from_secs(1)
            }
        );
    }

    #[test]
    fn disconnect_from_any_state() {
        let mut m = machine();
        assert_eq!(m.handle(SessionEvent::Disconnect).effect, Effect::None);

        m.handle(SessionEvent::Enable);
        m.handle(SessionEvent::ChannelFailed);
        let t = m.handle(SessionEvent::Disconnect);
        assert_eq!(t.to, SessionState::Disconnected);
        assert_eq!(t.effect, Effect::Teardown);
        assert_eq!(m.attempts(), 0);

        assert_eq!(m.handle(SessionEvent::Enable).to, SessionState::Connecting);
    }

    #[test]
    fn stray_events_are_ignored() {
        let mut m = machine();
        assert_eq!(m.handle(SessionEvent::Acknowledged).effect, Effect::None);
        assert_eq!(m.handle(SessionEvent::ChannelFailed).effect, Effect::None);
        assert_eq!(m.state(), &SessionState::Disconnected);
    }
}
