//! Integration tests for [`RealtimeClient`] against an in-process
//! Phoenix-style socket.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;

use tabula_backend::realtime::RealtimeClient;
use tabula_backend::BackendError;
use tabula_core::job::JobStatus;

use common::{join_reply, realtime_server, row_update};

const WAIT: Duration = Duration::from_secs(5);

async fn next_frame(frames: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    timeout(WAIT, frames.recv())
        .await
        .expect("frame within timeout")
        .expect("server still running")
}

// ---------------------------------------------------------------------------
// Test: join, forward a row update, heartbeat, leave on close
// ---------------------------------------------------------------------------

#[tokio::test]
async fn session_joins_forwards_updates_and_leaves_on_close() {
    let topic = RealtimeClient::topic_for("job-9");
    let replies = vec![
        join_reply(&topic, "ok", json!({})),
        row_update(
            &topic,
            json!({
                "id": "job-9",
                "status": "processing",
                "progress_percentage": 55,
                "progress_message": "Sheet 3",
                "error_message": null,
            }),
        ),
    ];
    let (url, mut frames) = realtime_server(replies, false).await;
    let client = RealtimeClient::new(url, "anon").with_heartbeat(Duration::from_millis(50));

    let mut feed = client.subscribe("job-9").await.unwrap();

    let join = next_frame(&mut frames).await;
    assert_eq!(join["event"], "phx_join");
    assert_eq!(join["topic"], topic);
    assert_eq!(join["ref"], "1");
    assert_eq!(join["payload"]["config"]["postgres_changes"][0]["filter"], "id=eq.job-9");
    assert_eq!(join["payload"]["access_token"], "anon");

    let report = timeout(WAIT, feed.next())
        .await
        .expect("update within timeout")
        .expect("feed open")
        .expect("update decoded");
    assert_eq!(report.status, JobStatus::Processing);
    assert_eq!(report.percent, Some(55));
    assert_eq!(report.message.as_deref(), Some("Sheet 3"));

    let beat = next_frame(&mut frames).await;
    assert_eq!(beat["topic"], "phoenix");
    assert_eq!(beat["event"], "heartbeat");

    feed.close();

    let leave = loop {
        let frame = next_frame(&mut frames).await;
        if frame["event"] != "heartbeat" {
            break frame;
        }
    };
    assert_eq!(leave["event"], "phx_leave");
    assert_eq!(leave["topic"], topic);
}

// ---------------------------------------------------------------------------
// Test: the session ends on rejection or server close
// ---------------------------------------------------------------------------

#[tokio::test]
async fn join_rejection_ends_the_feed() {
    let topic = RealtimeClient::topic_for("job-9");
    let replies = vec![join_reply(&topic, "error", json!({"reason": "unauthorized"}))];
    let (url, _frames) = realtime_server(replies, false).await;

    let mut feed = RealtimeClient::new(url, "anon").subscribe("job-9").await.unwrap();

    let first = timeout(WAIT, feed.next()).await.expect("item within timeout");
    assert_matches!(first, Some(Err(BackendError::Realtime(msg))) if msg.contains("unauthorized"));
    assert!(timeout(WAIT, feed.next()).await.unwrap().is_none());
}

#[tokio::test]
async fn server_close_ends_the_feed() {
    let topic = RealtimeClient::topic_for("job-9");
    let (url, _frames) = realtime_server(vec![join_reply(&topic, "ok", json!({}))], true).await;

    let mut feed = RealtimeClient::new(url, "anon").subscribe("job-9").await.unwrap();

    let first = timeout(WAIT, feed.next()).await.expect("item within timeout");
    assert_matches!(first, Some(Err(BackendError::Realtime(_))));
    assert!(timeout(WAIT, feed.next()).await.unwrap().is_none());
}

#[tokio::test]
async fn unreachable_server_fails_to_subscribe() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = RealtimeClient::new(format!("ws://{addr}/realtime/v1"), "anon");
    assert_matches!(client.subscribe("job-9").await, Err(BackendError::Realtime(_)));
}
