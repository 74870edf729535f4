//! Realtime change feed over WebSocket.
//!
//! Opens one channel on the backend's realtime endpoint, joins it with a set
//! of `postgres_changes` bindings, and forwards what happens as [`FeedEvent`]s
//! through an `mpsc` channel. A channel that fails or times out reports it
//! once and stops; reconnect policy belongs to the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use deskflow_api::{ChangeBinding, ChangeKind, FeedEvent, RealtimeClient};
//!
//! let client = RealtimeClient::new("https://project.example", &api_key)?;
//! let mut feed = client.subscribe(
//!     "notifications-42",
//!     vec![ChangeBinding::new(ChangeKind::Insert, "tickets")],
//! );
//!
//! while let Some(event) = feed.recv().await {
//!     if let FeedEvent::Change(change) = event {
//!         println!("{} on {}", change.kind, change.table);
//!     }
//! }
//! ```

use std::fmt;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::rest::Row;

// ── Defaults ─────────────────────────────────────────────────────────

const FEED_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(30);
const PROTOCOL_VERSION: &str = "1.0.0";

// ── Bindings ─────────────────────────────────────────────────────────

/// Row-level change type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        })
    }
}

/// One `postgres_changes` subscription inside a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBinding {
    pub event: ChangeKind,
    pub schema: String,
    pub table: String,
    /// Row-level filter, e.g. `assigned_to=eq.42`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl ChangeBinding {
    /// Binding on the `public` schema with no row filter.
    pub fn new(event: ChangeKind, table: impl Into<String>) -> Self {
        Self {
            event,
            schema: "public".into(),
            table: table.into(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Whether a change payload satisfies this binding.
    ///
    /// Filters of the form `column=eq.value` are evaluated against the new
    /// record; anything else is assumed to be enforced server-side.
    pub fn matches(&self, change: &ChangePayload) -> bool {
        if self.event != change.kind || self.table != change.table || self.schema != change.schema
        {
            return false;
        }
        let Some(filter) = &self.filter else {
            return true;
        };
        let Some((column, expected)) = filter
            .split_once('=')
            .and_then(|(col, rhs)| rhs.strip_prefix("eq.").map(|v| (col, v)))
        else {
            return true;
        };
        change
            .record
            .get(column)
            .is_some_and(|value| match value {
                serde_json::Value::String(s) => s == expected,
                other => other.to_string() == expected,
            })
    }
}

// ── Feed events ──────────────────────────────────────────────────────

/// A row change delivered by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePayload {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub schema: String,
    pub table: String,
    #[serde(default)]
    pub record: Row,
    #[serde(default)]
    pub old_record: Option<Row>,
    #[serde(default)]
    pub commit_timestamp: Option<String>,
}

/// Everything a channel can report.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// The server acknowledged the join.
    Subscribed,
    /// A row change matching one of the bindings.
    Change(ChangePayload),
    /// Join rejected, transport failure, or server-side channel error.
    ChannelError(String),
    /// No join acknowledgement within the join timeout.
    TimedOut,
    /// The connection ended without an error.
    Closed,
}

impl FeedEvent {
    /// Whether this event ends the channel.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ChannelError(_) | Self::TimedOut | Self::Closed)
    }
}

// ── FeedHandle ───────────────────────────────────────────────────────

/// Receiving end of a channel. Dropping it tears the channel down.
pub struct FeedHandle {
    events: mpsc::Receiver<FeedEvent>,
    cancel: CancellationToken,
}

impl FeedHandle {
    /// Wrap an event receiver and the token that stops its producer.
    ///
    /// Used by in-memory feeds that produce [`FeedEvent`]s themselves.
    pub fn new(events: mpsc::Receiver<FeedEvent>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    /// Next event, or `None` once the producer has gone away.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.events.recv().await
    }

    /// Signal the producer to leave the channel and close the socket.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl fmt::Debug for FeedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedHandle")
            .field("closed", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

// ── RealtimeClient ───────────────────────────────────────────────────

/// Factory for realtime channels against one project.
#[derive(Clone)]
pub struct RealtimeClient {
    ws_url: Url,
    join_timeout: Duration,
    heartbeat: Duration,
}

impl RealtimeClient {
    /// `https://project.example` -> `wss://project.example/realtime/v1/websocket?apikey=..`
    pub fn new(project_url: &str, api_key: &SecretString) -> Result<Self, Error> {
        let mut url = Url::parse(project_url)?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::Setup(format!("cannot use {scheme} for {project_url}")))?;

        let path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{path}/realtime/v1/websocket"));
        url.query_pairs_mut()
            .clear()
            .append_pair("apikey", api_key.expose_secret())
            .append_pair("vsn", PROTOCOL_VERSION);

        Ok(Self {
            ws_url: url,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            heartbeat: DEFAULT_HEARTBEAT,
        })
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = interval;
        self
    }

    /// Open a channel and start forwarding events.
    ///
    /// Returns immediately; the connection happens on a background task and
    /// its outcome arrives as the first [`FeedEvent`]s.
    pub fn subscribe(&self, channel: &str, bindings: Vec<ChangeBinding>) -> FeedHandle {
        let (tx, rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let task = ChannelTask {
            ws_url: self.ws_url.clone(),
            topic: format!("realtime:{channel}"),
            bindings,
            join_timeout: self.join_timeout,
            heartbeat: self.heartbeat,
        };
        let task_cancel = cancel.clone();
        tokio::spawn(async move { task.run(tx, task_cancel).await });

        FeedHandle::new(rx, cancel)
    }
}

// ── Background channel task ──────────────────────────────────────────

struct ChannelTask {
    ws_url: Url,
    topic: String,
    bindings: Vec<ChangeBinding>,
    join_timeout: Duration,
    heartbeat: Duration,
}

impl ChannelTask {
    async fn run(self, tx: mpsc::Sender<FeedEvent>, cancel: CancellationToken) {
        let terminal = match self.connect_and_read(&tx, &cancel).await {
            Ok(event) => event,
            Err(e) => FeedEvent::ChannelError(e.to_string()),
        };

        if !cancel.is_cancelled() {
            tracing::debug!(topic = %self.topic, ?terminal, "realtime channel ended");
            let _ = tx.send(terminal).await;
        }
    }

    /// Connect, join, and pump frames until the channel ends.
    ///
    /// Returns the terminal event to report (`Closed` or `TimedOut`);
    /// transport failures come back as `Err`. The join timeout covers the
    /// handshake as well as the join reply.
    async fn connect_and_read(
        &self,
        tx: &mpsc::Sender<FeedEvent>,
        cancel: &CancellationToken,
    ) -> Result<FeedEvent, Error> {
        tracing::info!(topic = %self.topic, "connecting to realtime endpoint");

        let join_deadline = tokio::time::sleep(self.join_timeout);
        tokio::pin!(join_deadline);

        let (ws_stream, _response) = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(FeedEvent::Closed),
            () = &mut join_deadline => {
                tracing::warn!(topic = %self.topic, "realtime connect timed out");
                return Ok(FeedEvent::TimedOut);
            }
            connected = tokio_tungstenite::connect_async(self.ws_url.as_str()) => {
                connected.map_err(|e| Error::WebSocketConnect(e.to_string()))?
            }
        };
        let (mut write, mut read) = ws_stream.split();

        let mut next_ref: u64 = 1;
        let join_ref = next_ref.to_string();
        let join = join_message(&self.topic, &self.bindings, &join_ref);
        write
            .send(tungstenite::Message::text(join.to_string()))
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        let mut joined = false;

        let mut heartbeat = tokio::time::interval(self.heartbeat);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    next_ref += 1;
                    let leave = leave_message(&self.topic, &next_ref.to_string());
                    let _ = write.send(tungstenite::Message::text(leave.to_string())).await;
                    let _ = write.close().await;
                    return Ok(FeedEvent::Closed);
                }
                () = &mut join_deadline, if !joined => {
                    tracing::warn!(topic = %self.topic, "realtime join timed out");
                    return Ok(FeedEvent::TimedOut);
                }
                _ = heartbeat.tick() => {
                    next_ref += 1;
                    let beat = heartbeat_message(&next_ref.to_string());
                    write
                        .send(tungstenite::Message::text(beat.to_string()))
                        .await
                        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
                }
                frame = read.next() => {
                    match frame {
                        Some(Ok(tungstenite::Message::Text(text))) => {
                            match parse_frame(&text, &self.topic, &join_ref) {
                                FrameAction::Joined => {
                                    joined = true;
                                    let _ = tx.send(FeedEvent::Subscribed).await;
                                }
                                FrameAction::Change(change) => {
                                    let _ = tx.send(FeedEvent::Change(change)).await;
                                }
                                FrameAction::Error(message) => {
                                    return Ok(FeedEvent::ChannelError(message));
                                }
                                FrameAction::Ignore => {}
                            }
                        }
                        Some(Ok(tungstenite::Message::Close(frame))) => {
                            if let Some(cf) = frame {
                                return Err(Error::WebSocketClosed {
                                    code: cf.code.into(),
                                    reason: cf.reason.as_str().to_owned(),
                                });
                            }
                            return Ok(FeedEvent::Closed);
                        }
                        Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                        None => return Ok(FeedEvent::Closed),
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }
}

// ── Wire protocol ────────────────────────────────────────────────────

/// Phoenix-style envelope used by the realtime endpoint.
#[derive(Debug, Deserialize)]
struct Envelope {
    topic: String,
    event: String,
    #[serde(default)]
    payload: serde_json::Value,
    #[serde(default, rename = "ref")]
    reference: Option<String>,
}

#[derive(Debug, PartialEq)]
enum FrameAction {
    Joined,
    Change(ChangePayload),
    Error(String),
    Ignore,
}

fn join_message(topic: &str, bindings: &[ChangeBinding], reference: &str) -> serde_json::Value {
    serde_json::json!({
        "topic": topic,
        "event": "phx_join",
        "payload": { "config": { "postgres_changes": bindings } },
        "ref": reference,
    })
}

fn leave_message(topic: &str, reference: &str) -> serde_json::Value {
    serde_json::json!({
        "topic": topic,
        "event": "phx_leave",
        "payload": {},
        "ref": reference,
    })
}

fn heartbeat_message(reference: &str) -> serde_json::Value {
    serde_json::json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": reference,
    })
}

fn parse_frame(text: &str, topic: &str, join_ref: &str) -> FrameAction {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!(error = %e, "failed to parse realtime frame");
            return FrameAction::Ignore;
        }
    };

    if envelope.topic != topic {
        return FrameAction::Ignore;
    }

    match envelope.event.as_str() {
        "phx_reply" if envelope.reference.as_deref() == Some(join_ref) => {
            match envelope.payload["status"].as_str() {
                Some("ok") => FrameAction::Joined,
                _ => FrameAction::Error(
                    envelope.payload["response"]["reason"]
                        .as_str()
                        .unwrap_or("join rejected")
                        .to_owned(),
                ),
            }
        }
        "phx_error" => FrameAction::Error("channel error".into()),
        "phx_close" => FrameAction::Error("channel closed by server".into()),
        "postgres_changes" => {
            match serde_json::from_value::<ChangePayload>(envelope.payload["data"].clone()) {
                Ok(change) => FrameAction::Change(change),
                Err(e) => {
                    tracing::debug!(error = %e, "could not deserialize change payload");
                    FrameAction::Ignore
                }
            }
        }
        _ => FrameAction::Ignore,
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    const TOPIC: &str = "realtime:notifications-7";

    fn change(kind: ChangeKind, table: &str, record: serde_json::Value) -> ChangePayload {
        ChangePayload {
            kind,
            schema: "public".into(),
            table: table.into(),
            record: record.as_object().cloned().unwrap(),
            old_record: None,
            commit_timestamp: None,
        }
    }

    #[test]
    fn websocket_url_from_https_project() {
        let key = SecretString::from("anon-key".to_owned());
        let client = RealtimeClient::new("https://abc.example.co", &key).unwrap();
        assert_eq!(
            client.ws_url.as_str(),
            "wss://abc.example.co/realtime/v1/websocket?apikey=anon-key&vsn=1.0.0"
        );
    }

    #[test]
    fn websocket_url_from_plain_http_project() {
        let key = SecretString::from("k".to_owned());
        let client = RealtimeClient::new("http://localhost:54321", &key).unwrap();
        assert!(client.ws_url.as_str().starts_with("ws://localhost:54321/realtime/v1/"));
    }

    #[test]
    fn join_message_carries_bindings() {
        let bindings = vec![
            ChangeBinding::new(ChangeKind::Insert, "tickets"),
            ChangeBinding::new(ChangeKind::Update, "tickets").with_filter("assigned_to=eq.7"),
        ];
        let msg = join_message(TOPIC, &bindings, "1");

        assert_eq!(msg["event"], "phx_join");
        let changes = &msg["payload"]["config"]["postgres_changes"];
        assert_eq!(changes[0]["event"], "INSERT");
        assert!(changes[0].get("filter").is_none());
        assert_eq!(changes[1]["filter"], "assigned_to=eq.7");
    }

    #[test]
    fn join_reply_ok_means_subscribed() {
        let frame = json!({
            "topic": TOPIC, "event": "phx_reply", "ref": "1",
            "payload": { "status": "ok", "response": {} }
        });
        assert_eq!(parse_frame(&frame.to_string(), TOPIC, "1"), FrameAction::Joined);
    }

    #[test]
    fn join_reply_error_carries_reason() {
        let frame = json!({
            "topic": TOPIC, "event": "phx_reply", "ref": "1",
            "payload": { "status": "error", "response": { "reason": "unauthorized" } }
        });
        assert_eq!(
            parse_frame(&frame.to_string(), TOPIC, "1"),
            FrameAction::Error("unauthorized".into())
        );
    }

    #[test]
    fn heartbeat_reply_is_ignored() {
        let frame = json!({
            "topic": "phoenix", "event": "phx_reply", "ref": "2",
            "payload": { "status": "ok" }
        });
        assert_eq!(parse_frame(&frame.to_string(), TOPIC, "1"), FrameAction::Ignore);
    }

    #[test]
    fn postgres_change_is_parsed() {
        let frame = json!({
            "topic": TOPIC, "event": "postgres_changes", "ref": null,
            "payload": { "data": {
                "type": "INSERT", "schema": "public", "table": "tickets",
                "record": { "id": 9, "title": "Printer on fire" },
                "commit_timestamp": "2026-03-01T10:00:00Z"
            }, "ids": [1] }
        });

        let FrameAction::Change(change) = parse_frame(&frame.to_string(), TOPIC, "1") else {
            panic!("expected a change");
        };
        assert_eq!(change.kind, ChangeKind::Insert);
        assert_eq!(change.table, "tickets");
        assert_eq!(change.record["title"], "Printer on fire");
    }

    #[test]
    fn malformed_frame_is_ignored() {
        assert_eq!(parse_frame("not json", TOPIC, "1"), FrameAction::Ignore);
    }

    #[test]
    fn binding_filter_matches_numeric_and_string_columns() {
        let binding =
            ChangeBinding::new(ChangeKind::Update, "tickets").with_filter("assigned_to=eq.7");

        assert!(binding.matches(&change(
            ChangeKind::Update,
            "tickets",
            json!({ "id": 1, "assigned_to": 7 })
        )));
        assert!(binding.matches(&change(
            ChangeKind::Update,
            "tickets",
            json!({ "id": 1, "assigned_to": "7" })
        )));
        assert!(!binding.matches(&change(
            ChangeKind::Update,
            "tickets",
            json!({ "id": 1, "assigned_to": 8 })
        )));
        assert!(!binding.matches(&change(
            ChangeKind::Insert,
            "tickets",
            json!({ "id": 1, "assigned_to": 7 })
        )));
    }

    #[tokio::test]
    async fn stalled_handshake_times_out() {
        // Accepts the TCP connection but never answers the upgrade request.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let key = SecretString::from("k".to_owned());
        let client = RealtimeClient::new(&format!("http://{addr}"), &key)
            .unwrap()
            .with_join_timeout(Duration::from_millis(200));

        let mut feed = client.subscribe("notifications-7", Vec::new());
        let event = tokio::time::timeout(Duration::from_secs(5), feed.recv())
            .await
            .unwrap();

        assert_eq!(event, Some(FeedEvent::TimedOut));
        drop(listener);
    }

    #[test]
    fn terminal_events() {
        assert!(FeedEvent::TimedOut.is_terminal());
        assert!(FeedEvent::Closed.is_terminal());
        assert!(FeedEvent::ChannelError("x".into()).is_terminal());
        assert!(!FeedEvent::Subscribed.is_terminal());
    }
}
