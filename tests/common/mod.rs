//! A minimal in-process aw-server for integration tests.

#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};

/// A heartbeat as received by the fake server.
#[derive(Debug, Clone)]
pub struct ReceivedHeartbeat {
    pub bucket_id: String,
    pub pulsetime: u64,
    pub body: serde_json::Value,
}

#[derive(Default)]
pub struct FakeServerState {
    pub buckets: Mutex<HashMap<String, serde_json::Value>>,
    pub heartbeats: Mutex<Vec<ReceivedHeartbeat>>,
    pub fail_buckets: AtomicBool,
}

impl FakeServerState {
    pub fn set_fail_buckets(&self, fail: bool) {
        self.fail_buckets.store(fail, Ordering::SeqCst);
    }

    pub async fn heartbeat_count(&self) -> usize {
        self.heartbeats.lock().await.len()
    }
}

#[derive(Deserialize)]
struct HeartbeatParams {
    pulsetime: u64,
}

async fn info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "hostname": "fake-host",
        "version": "v0.0.0-test",
        "testing": true
    }))
}

async fn create_bucket(
    State(state): State<Arc<FakeServerState>>,
    Path(bucket_id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    if state.fail_buckets.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    let mut buckets = state.buckets.lock().await;
    if buckets.contains_key(&bucket_id) {
        return StatusCode::NOT_MODIFIED;
    }
    buckets.insert(bucket_id, body);
    StatusCode::OK
}

async fn heartbeat(
    State(state): State<Arc<FakeServerState>>,
    Path(bucket_id): Path<String>,
    Query(params): Query<HeartbeatParams>,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    if !state.buckets.lock().await.contains_key(&bucket_id) {
        return StatusCode::NOT_FOUND;
    }

    state.heartbeats.lock().await.push(ReceivedHeartbeat {
        bucket_id,
        pulsetime: params.pulsetime,
        body,
    });
    StatusCode::OK
}

/// Start the fake server on a random port.
pub async fn start_fake_server() -> (SocketAddr, Arc<FakeServerState>, oneshot::Sender<()>) {
    let state = Arc::new(FakeServerState::default());

    let app = Router::new()
        .route("/api/0/info", get(info))
        .route("/api/0/buckets/:bucket_id", post(create_bucket))
        .route("/api/0/buckets/:bucket_id/heartbeat", post(heartbeat))
        .with_state(Arc::clone(&state));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake server");
    let addr = listener.local_addr().expect("Failed to read local addr");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
    });

    (addr, state, shutdown_tx)
}

/// A port nothing is listening on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    listener.local_addr().expect("Failed to read local addr").port()
}

/// Poll `check` until it returns true or the timeout expires.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
