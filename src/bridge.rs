//! HTTP bridge between an editor plugin and the watcher.
//!
//! The editor plugin posts a notification for every selection or active
//! editor change, carrying the editor state at that moment. The bridge hands
//! it to the controller loop and answers immediately; dispatch decisions are
//! never reported back to the editor.
//!
//! # Architecture
//!
//! ```text
//! Editor plugin ──→ POST /events ──→ bridge ──→ controller ──→ aw-server
//!               ──→ POST /reload ─────┘            │
//!               ←── GET  /status ←── watch channel ┘
//! ```

use crate::context::{EditorEventKind, EditorUpdate};
use crate::controller::{HostMessage, WatcherStatus};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch};

/// Bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Port to bind to on 127.0.0.1 (0 for random)
    pub port: u16,
}

impl BridgeConfig {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

/// Shared bridge state
struct BridgeState {
    /// Sender into the controller loop
    sender: mpsc::Sender<HostMessage>,
    /// Latest controller status
    status: watch::Receiver<WatcherStatus>,
}

/// Notification posted by the editor plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorNotification {
    pub kind: EditorEventKind,
    #[serde(flatten)]
    pub update: EditorUpdate,
}

/// Acknowledgement for accepted requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accepted {
    pub status: String,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type BridgeResult = Result<(StatusCode, Json<Accepted>), (StatusCode, Json<ErrorResponse>)>;

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /events
async fn events(
    State(state): State<Arc<BridgeState>>,
    Json(notification): Json<EditorNotification>,
) -> BridgeResult {
    forward(
        &state,
        HostMessage::Editor {
            kind: notification.kind,
            update: notification.update,
        },
    )
    .await
}

/// POST /reload
async fn reload(State(state): State<Arc<BridgeState>>) -> BridgeResult {
    forward(&state, HostMessage::Reload).await
}

/// GET /status
async fn status(State(state): State<Arc<BridgeState>>) -> Json<WatcherStatus> {
    Json(state.status.borrow().clone())
}

async fn forward(state: &BridgeState, message: HostMessage) -> BridgeResult {
    state.sender.send(message).await.map_err(|_| {
        tracing::warn!("Watcher is not running, dropping bridge request");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "Watcher is not running".to_string(),
                code: "WATCHER_STOPPED".to_string(),
            }),
        )
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(Accepted {
            status: "accepted".to_string(),
        }),
    ))
}

/// Build the bridge router.
pub fn router(
    sender: mpsc::Sender<HostMessage>,
    status_rx: watch::Receiver<WatcherStatus>,
) -> Router {
    let state = Arc::new(BridgeState {
        sender,
        status: status_rx,
    });

    Router::new()
        .route("/health", get(health))
        .route("/events", post(events))
        .route("/reload", post(reload))
        .route("/status", get(status))
        .with_state(state)
}

/// Run the bridge server
pub async fn run(
    config: BridgeConfig,
    sender: mpsc::Sender<HostMessage>,
    status_rx: watch::Receiver<WatcherStatus>,
) -> anyhow::Result<(SocketAddr, oneshot::Sender<()>)> {
    let app = router(sender, status_rx);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Editor bridge listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Bridge shutdown signal received");
            })
            .await
        {
            tracing::error!("Bridge error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
