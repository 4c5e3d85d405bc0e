//! Realtime change subscription over a Phoenix-channel WebSocket.
//!
//! The cloud backend stores jobs in a database table and publishes row
//! changes through a Supabase-style realtime server. [`RealtimeClient`]
//! joins one topic per job, filtered to `UPDATE`s of that job's row, and
//! turns each change record into a [`StatusReport`].
//!
//! The socket is driven by a background task that also sends heartbeats.
//! The task stops when the returned [`UpdateFeed`] is dropped: it sends
//! `phx_leave`, closes the socket and exits.

use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;

use tabula_core::job::StatusReport;

use crate::error::BackendError;
use crate::feed::UpdateFeed;
use crate::messages::StatusRecord;

/// Phoenix requires a heartbeat at least every 60 seconds.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(30);

/// Upper bound on the WebSocket handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Buffered change records between the socket task and the consumer.
const FEED_CHANNEL_CAPACITY: usize = 32;

pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_LEAVE: &str = "phx_leave";
pub const EVENT_REPLY: &str = "phx_reply";
pub const EVENT_ERROR: &str = "phx_error";
pub const EVENT_CLOSE: &str = "phx_close";
pub const EVENT_HEARTBEAT: &str = "heartbeat";
pub const EVENT_POSTGRES_CHANGES: &str = "postgres_changes";

const PHOENIX_TOPIC: &str = "phoenix";
const JOIN_REF: &str = "1";

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// One Phoenix channel frame (serializer `vsn=1.0.0`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

impl PhoenixMessage {
    fn new(topic: impl Into<String>, event: &str, payload: serde_json::Value, reference: String) -> Self {
        Self {
            topic: topic.into(),
            event: event.to_string(),
            payload,
            reference: Some(reference),
        }
    }
}

/// What an incoming frame means for the subscribed job.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// The server accepted the join.
    Joined,
    /// The server refused the join.
    JoinRejected(String),
    /// The job's row changed.
    Changed(StatusRecord),
    /// The server closed or errored the channel.
    Closed(String),
    /// Heartbeat replies, presence, system notices.
    Other,
}

#[derive(Debug, Deserialize)]
struct ReplyPayload {
    status: String,
    #[serde(default)]
    response: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChangePayload {
    data: ChangeData,
}

#[derive(Debug, Deserialize)]
struct ChangeData {
    #[serde(rename = "type")]
    kind: String,
    record: StatusRecord,
}

/// Interpret a frame received on `topic`.
pub fn interpret(msg: &PhoenixMessage, topic: &str) -> Result<ChannelEvent, BackendError> {
    if msg.topic != topic {
        return Ok(ChannelEvent::Other);
    }
    match msg.event.as_str() {
        EVENT_REPLY if msg.reference.as_deref() == Some(JOIN_REF) => {
            let reply: ReplyPayload = serde_json::from_value(msg.payload.clone())?;
            if reply.status == "ok" {
                Ok(ChannelEvent::Joined)
            } else {
                Ok(ChannelEvent::JoinRejected(reply.response.to_string()))
            }
        }
        EVENT_POSTGRES_CHANGES => {
            let change: ChangePayload = serde_json::from_value(msg.payload.clone())?;
            if change.data.kind.eq_ignore_ascii_case("UPDATE") {
                Ok(ChannelEvent::Changed(change.data.record))
            } else {
                Ok(ChannelEvent::Other)
            }
        }
        EVENT_ERROR => Ok(ChannelEvent::Closed("channel error".to_string())),
        EVENT_CLOSE => Ok(ChannelEvent::Closed("channel closed by server".to_string())),
        _ => Ok(ChannelEvent::Other),
    }
}

// ---------------------------------------------------------------------------
// RealtimeClient
// ---------------------------------------------------------------------------

/// Connection settings for the realtime server.
#[derive(Debug, Clone)]
pub struct RealtimeClient {
    url: String,
    api_key: String,
    schema: String,
    table: String,
    heartbeat: Duration,
}

impl RealtimeClient {
    /// * `url`     - realtime base, e.g. `wss://<project>.supabase.co/realtime/v1`.
    /// * `api_key` - public (anon) key presented on connect and join.
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            schema: "public".to_string(),
            table: "translation_jobs".to_string(),
            heartbeat: DEFAULT_HEARTBEAT,
        }
    }

    /// Watch a different table (defaults to `public.translation_jobs`).
    pub fn with_table(mut self, schema: impl Into<String>, table: impl Into<String>) -> Self {
        self.schema = schema.into();
        self.table = table.into();
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Full WebSocket endpoint including the key and serializer version.
    pub fn socket_url(&self) -> String {
        format!("{}/websocket?apikey={}&vsn=1.0.0", self.url, self.api_key)
    }

    /// Channel topic for one job.
    pub fn topic_for(job_id: &str) -> String {
        format!("realtime:translation_job_{job_id}")
    }

    /// Join frame subscribing to updates of one job's row.
    pub fn join_message(&self, job_id: &str) -> PhoenixMessage {
        let payload = json!({
            "config": {
                "broadcast": { "ack": false, "self": false },
                "presence": { "key": "" },
                "postgres_changes": [{
                    "event": "UPDATE",
                    "schema": self.schema,
                    "table": self.table,
                    "filter": format!("id=eq.{job_id}"),
                }],
            },
            "access_token": self.api_key,
        });
        PhoenixMessage::new(Self::topic_for(job_id), EVENT_JOIN, payload, JOIN_REF.to_string())
    }

    /// Connect, join the job's topic and return a feed of its row updates.
    pub async fn subscribe(&self, job_id: &str) -> Result<UpdateFeed, BackendError> {
        let connected = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(self.socket_url()))
            .await
            .map_err(|_| {
                BackendError::Realtime(format!("Timed out connecting to realtime at {}", self.url))
            })?;
        let (ws_stream, _response) = connected.map_err(|e| {
            BackendError::Realtime(format!("Failed to connect to realtime at {}: {e}", self.url))
        })?;
        let (mut sink, stream) = ws_stream.split();

        let join = serde_json::to_string(&self.join_message(job_id))?;
        sink.send(Message::Text(join))
            .await
            .map_err(|e| BackendError::Realtime(format!("Failed to join channel: {e}")))?;

        tracing::info!(job_id, topic = %Self::topic_for(job_id), "Realtime subscription opened");

        let (tx, rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let session = ChannelSession {
            topic: Self::topic_for(job_id),
            heartbeat: self.heartbeat,
            tx,
            cancel: cancel.clone(),
            next_ref: 2,
        };
        tokio::spawn(session.run(sink, stream));

        let updates = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(UpdateFeed::new(updates).with_teardown(cancel))
    }
}

// ---------------------------------------------------------------------------
// Socket task
// ---------------------------------------------------------------------------

struct ChannelSession {
    topic: String,
    heartbeat: Duration,
    tx: mpsc::Sender<Result<StatusReport, BackendError>>,
    cancel: CancellationToken,
    next_ref: u64,
}

impl ChannelSession {
    fn take_ref(&mut self) -> String {
        let r = self.next_ref;
        self.next_ref += 1;
        r.to_string()
    }

    /// Drive the socket until the consumer goes away or the server ends
    /// the channel.
    async fn run<Si, St>(mut self, mut sink: Si, mut stream: St)
    where
        Si: Sink<Message, Error = WsError> + Unpin,
        St: Stream<Item = Result<Message, WsError>> + Unpin,
    {
        let start = tokio::time::Instant::now() + self.heartbeat;
        let mut ticker = tokio::time::interval_at(start, self.heartbeat);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let leave = PhoenixMessage::new(
                        self.topic.clone(),
                        EVENT_LEAVE,
                        json!({}),
                        self.take_ref(),
                    );
                    if let Ok(text) = serde_json::to_string(&leave) {
                        let _ = sink.send(Message::Text(text)).await;
                    }
                    let _ = sink.close().await;
                    tracing::debug!(topic = %self.topic, "Realtime subscription closed");
                    break;
                }
                _ = ticker.tick() => {
                    let beat = PhoenixMessage::new(PHOENIX_TOPIC, EVENT_HEARTBEAT, json!({}), self.take_ref());
                    let sent = match serde_json::to_string(&beat) {
                        Ok(text) => sink.send(Message::Text(text)).await.map_err(|e| e.to_string()),
                        Err(e) => Err(e.to_string()),
                    };
                    if let Err(e) = sent {
                        self.report(Err(BackendError::Realtime(format!("Heartbeat failed: {e}")))).await;
                        break;
                    }
                }
                msg = stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if !self.handle_text(&text).await {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(topic = %self.topic, ?frame, "Realtime socket closed by server");
                            self.report(Err(BackendError::Realtime("socket closed".to_string()))).await;
                            break;
                        }
                        Some(Ok(_)) => {
                            // Ping / Pong / Binary: nothing to do.
                        }
                        Some(Err(e)) => {
                            tracing::warn!(topic = %self.topic, error = %e, "Realtime receive error");
                            self.report(Err(BackendError::Realtime(e.to_string()))).await;
                            break;
                        }
                        None => {
                            self.report(Err(BackendError::Realtime("socket exhausted".to_string()))).await;
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Returns `false` when the session should end.
    async fn handle_text(&mut self, text: &str) -> bool {
        let msg = match serde_json::from_str::<PhoenixMessage>(text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(error = %e, raw = %text, "Unparseable realtime frame");
                return true;
            }
        };
        match interpret(&msg, &self.topic) {
            Ok(ChannelEvent::Joined) => {
                tracing::debug!(topic = %self.topic, "Realtime channel joined");
                true
            }
            Ok(ChannelEvent::Changed(record)) => self.report(Ok(record.into_report())).await,
            Ok(ChannelEvent::JoinRejected(reason)) => {
                self.report(Err(BackendError::Realtime(format!("Join rejected: {reason}"))))
                    .await;
                false
            }
            Ok(ChannelEvent::Closed(reason)) => {
                self.report(Err(BackendError::Realtime(reason))).await;
                false
            }
            Ok(ChannelEvent::Other) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed realtime payload");
                true
            }
        }
    }

    /// Forward an item to the feed. Returns `false` if the feed is gone.
    async fn report(&self, item: Result<StatusReport, BackendError>) -> bool {
        self.tx.send(item).await.is_ok()
    }
}
