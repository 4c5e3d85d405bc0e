//! In-process fake backends for the adapter tests.
//!
//! Each test builds a small axum router that behaves like one backend
//! style (or its realtime socket) and records what the client sent, then
//! binds it to an ephemeral port.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Everything the fake server received, keyed by field name.
#[derive(Debug, Default, Clone)]
pub struct Recorded {
    pub fields: HashMap<String, String>,
    pub file_name: Option<String>,
    pub file_bytes: Vec<u8>,
    pub file_content_type: Option<String>,
    pub json_bodies: Vec<Value>,
}

pub type Recorder = Arc<Mutex<Recorded>>;

/// Bind `app` to 127.0.0.1 on an ephemeral port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    format!("http://{addr}")
}

// ---------------------------------------------------------------------------
// Task backend
// ---------------------------------------------------------------------------

pub const SSE_BODY: &str = concat!(
    ": connected\n\n",
    "data: {\"current\": 1, \"total\": 4, \"message\": \"Translating Sheet1\", \"status\": \"processing\"}\n\n",
    "data: {\"current\": 4, \"total\": 4, \"message\": \"Translation complete!\", \"status\": \"complete\"}\n\n",
);

pub const RESULT_BYTES: &[u8] = b"PK\x03\x04translated";

async fn task_translate(State(rec): State<Recorder>, mut multipart: Multipart) -> impl IntoResponse {
    let mut recorded = Recorded::default();
    while let Some(field) = multipart.next_field().await.expect("multipart field") {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            recorded.file_name = field.file_name().map(str::to_string);
            recorded.file_content_type = field.content_type().map(str::to_string);
            recorded.file_bytes = field.bytes().await.expect("file bytes").to_vec();
        } else {
            let text = field.text().await.expect("text field");
            recorded.fields.insert(name, text);
        }
    }

    let rejected = recorded.file_bytes.is_empty();
    *rec.lock().unwrap() = recorded;
    if rejected {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "No file provided"})));
    }
    (StatusCode::OK, Json(json!({"task_id": "task-1"})))
}

async fn task_progress(Path(id): Path<String>) -> impl IntoResponse {
    if id != "task-1" {
        return (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/event-stream")],
            "data: {\"error\": \"Task not found\"}\n\n".to_string(),
        );
    }
    (StatusCode::OK, [(CONTENT_TYPE, "text/event-stream")], SSE_BODY.to_string())
}

async fn task_download(Path(id): Path<String>) -> impl IntoResponse {
    if id == "task-1" {
        (StatusCode::OK, RESULT_BYTES.to_vec()).into_response()
    } else {
        (StatusCode::NOT_FOUND, Json(json!({"error": "File not ready"}))).into_response()
    }
}

pub fn task_backend(rec: Recorder) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "ok", "service": "excel-translator"})) }))
        .route("/languages", get(|| async { Json(json!({"en": "English", "fr": "French"})) }))
        .route("/translate", post(task_translate))
        .route("/progress/{id}", get(task_progress))
        .route("/download/{id}", get(task_download))
        .with_state(rec)
}

// ---------------------------------------------------------------------------
// Cloud backend
// ---------------------------------------------------------------------------

async fn cloud_translate(State(rec): State<Recorder>, Json(body): Json<Value>) -> impl IntoResponse {
    rec.lock().unwrap().json_bodies.push(body);
    (
        StatusCode::ACCEPTED,
        Json(json!({"task_id": "job-9", "status": "queued", "message": "Translation job created successfully"})),
    )
}

async fn cloud_process(State(rec): State<Recorder>, Json(body): Json<Value>) -> impl IntoResponse {
    rec.lock().unwrap().json_bodies.push(body);
    Json(json!({"success": true}))
}

async fn cloud_status(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    match params.get("job_id").map(String::as_str) {
        Some("job-9") => (
            StatusCode::OK,
            Json(json!({
                "job_id": "job-9",
                "status": "processing",
                "current": 30,
                "total": 60,
                "percentage": 50,
                "message": "Translating Sheet2",
                "error": null,
                "created_at": "2025-03-01T10:00:00.000000+00:00",
                "updated_at": "2025-03-01T10:00:05.123456+00:00",
            })),
        ),
        Some("job-failed") => (
            StatusCode::OK,
            Json(json!({"job_id": "job-failed", "status": "error", "percentage": 10, "error": "Quota exceeded"})),
        ),
        Some("job-garbled") => (StatusCode::OK, Json(json!({"job_id": "job-garbled", "status": "bad format"}))),
        Some(_) => (StatusCode::NOT_FOUND, Json(json!({"error": "Job not found"}))),
        None => (StatusCode::BAD_REQUEST, Json(json!({"error": "job_id parameter required"}))),
    }
}

async fn cloud_download(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    match params.get("job_id").map(String::as_str) {
        Some("job-9") => (StatusCode::OK, RESULT_BYTES.to_vec()).into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Job is not complete. Current status: processing"})),
        )
            .into_response(),
    }
}

pub fn cloud_backend(rec: Recorder) -> Router {
    Router::new()
        .route("/api/translate", post(cloud_translate))
        .route("/api/process_job", post(cloud_process))
        .route("/api/status", get(cloud_status))
        .route("/api/download", get(cloud_download))
        .with_state(rec)
}

// ---------------------------------------------------------------------------
// Realtime socket
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct RealtimeScript {
    replies: Arc<Vec<String>>,
    close_after_replies: bool,
    frames: mpsc::UnboundedSender<Value>,
}

/// A Phoenix-style socket that waits for the join, sends `replies` in
/// order, then either closes or forwards every frame the client sends.
///
/// Returns the realtime base URL and the frames received (join included).
pub async fn realtime_server(
    replies: Vec<String>,
    close_after_replies: bool,
) -> (String, mpsc::UnboundedReceiver<Value>) {
    let (frames, received) = mpsc::unbounded_channel();
    let script = RealtimeScript {
        replies: Arc::new(replies),
        close_after_replies,
        frames,
    };
    let app = Router::new()
        .route("/realtime/v1/websocket", get(realtime_socket))
        .with_state(script);
    let base = serve(app).await.replacen("http://", "ws://", 1);
    (format!("{base}/realtime/v1"), received)
}

async fn realtime_socket(
    State(script): State<RealtimeScript>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_realtime(socket, script))
}

async fn run_realtime(mut socket: WebSocket, script: RealtimeScript) {
    let Some(join) = next_frame(&mut socket).await else {
        return;
    };
    let _ = script.frames.send(join);

    for reply in script.replies.iter() {
        if socket.send(WsMessage::Text(reply.clone().into())).await.is_err() {
            return;
        }
    }
    if script.close_after_replies {
        let _ = socket.send(WsMessage::Close(None)).await;
        return;
    }

    while let Some(frame) = next_frame(&mut socket).await {
        if script.frames.send(frame).is_err() {
            break;
        }
    }
}

async fn next_frame(socket: &mut WebSocket) -> Option<Value> {
    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            WsMessage::Text(text) => return serde_json::from_str(text.as_str()).ok(),
            WsMessage::Close(_) => return None,
            _ => {}
        }
    }
    None
}

pub fn join_reply(topic: &str, status: &str, response: Value) -> String {
    json!({
        "topic": topic,
        "event": "phx_reply",
        "payload": { "status": status, "response": response },
        "ref": "1",
    })
    .to_string()
}

pub fn row_update(topic: &str, record: Value) -> String {
    json!({
        "topic": topic,
        "event": "postgres_changes",
        "payload": {
            "ids": [1],
            "data": {
                "type": "UPDATE",
                "schema": "public",
                "table": "translation_jobs",
                "commit_timestamp": "2025-01-01T00:00:00Z",
                "record": record,
                "old_record": {},
            },
        },
        "ref": null,
    })
    .to_string()
}
