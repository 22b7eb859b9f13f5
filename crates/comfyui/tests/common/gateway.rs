//! In-process fake of the ComfyUI generation gateway.
//!
//! Serves the three gateway endpoints from an Axum router bound to an
//! ephemeral port, with scripted replies and call counters. Shared by
//! the integration tests of every crate that talks to the gateway.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

/// One scripted HTTP reply.
#[derive(Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: json!({ "error": status.as_str() }),
        }
    }

    pub fn progress(task_id: &str, phase: &str, progress: f32) -> Self {
        Self::ok(json!({
            "task_id": task_id,
            "phase": phase,
            "progress": progress,
            "timestamp": "2024-05-01T12:00:00Z",
        }))
    }
}

pub struct FakeGateway {
    task_id: String,
    submit_failures: Mutex<VecDeque<StatusCode>>,
    submit_body: Mutex<Option<Value>>,
    status_replies: Mutex<VecDeque<Reply>>,
    last_status: Mutex<Option<Reply>>,
    result: Value,
    fail_results: bool,
    pub submit_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub result_calls: AtomicUsize,
}

impl FakeGateway {
    pub fn new(task_id: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            submit_failures: Mutex::new(VecDeque::new()),
            submit_body: Mutex::new(None),
            status_replies: Mutex::new(VecDeque::new()),
            last_status: Mutex::new(None),
            result: json!({
                "task_id": task_id,
                "images": ["out/0001.png", "out/0002.png"],
                "video": "out/clip.mp4",
            }),
            fail_results: false,
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            result_calls: AtomicUsize::new(0),
        }
    }

    /// Fail the next `count` submissions with `status`.
    pub fn fail_submits(self, count: usize, status: StatusCode) -> Self {
        self.submit_failures
            .lock()
            .unwrap()
            .extend(std::iter::repeat(status).take(count));
        self
    }

    /// Status replies served in order; the last one repeats forever.
    pub fn with_status_replies(self, replies: Vec<Reply>) -> Self {
        self.status_replies.lock().unwrap().extend(replies);
        self
    }

    /// Answer every result fetch with a 500.
    pub fn fail_results(mut self) -> Self {
        self.fail_results = true;
        self
    }

    pub fn submitted_body(&self) -> Option<Value> {
        self.submit_body.lock().unwrap().clone()
    }

    pub fn submits(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn results(&self) -> usize {
        self.result_calls.load(Ordering::SeqCst)
    }
}

async fn submit(
    State(gw): State<Arc<FakeGateway>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    gw.submit_calls.fetch_add(1, Ordering::SeqCst);
    *gw.submit_body.lock().unwrap() = Some(body);

    if let Some(status) = gw.submit_failures.lock().unwrap().pop_front() {
        return (status, Json(json!({ "error": "unavailable" })));
    }
    (StatusCode::OK, Json(json!({ "task_id": gw.task_id })))
}

async fn status(
    State(gw): State<Arc<FakeGateway>>,
    Path(task_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    gw.status_calls.fetch_add(1, Ordering::SeqCst);
    if task_id != gw.task_id {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "unknown task" })));
    }

    let next = gw.status_replies.lock().unwrap().pop_front();
    let reply = {
        let mut last = gw.last_status.lock().unwrap();
        if let Some(reply) = next {
            *last = Some(reply);
        }
        last.clone()
            .unwrap_or_else(|| Reply::progress(&gw.task_id, "submitted", 0.0))
    };
    (reply.status, Json(reply.body))
}

async fn result(
    State(gw): State<Arc<FakeGateway>>,
    Path(task_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    gw.result_calls.fetch_add(1, Ordering::SeqCst);
    if task_id != gw.task_id {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "unknown task" })));
    }
    if gw.fail_results {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "storage offline" })),
        );
    }
    (StatusCode::OK, Json(gw.result.clone()))
}

/// Serve `gateway` on an ephemeral local port and return its base URL.
pub async fn spawn_gateway(gateway: Arc<FakeGateway>) -> String {
    let app = Router::new()
        .route("/api/submit-workflow", post(submit))
        .route("/api/status/{task_id}", get(status))
        .route("/api/result/{task_id}", get(result))
        .with_state(gateway);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn sample_job() -> serde_json::Map<String, Value> {
    let mut job = serde_json::Map::new();
    job.insert("prompt".into(), json!("a lighthouse at dusk"));
    job.insert("steps".into(), json!(20));
    job
}
