//! aw-watcher-editor - editor activity watcher for ActivityWatch.
//!
//! Turns the stream of editor notifications (selection changes, active
//! editor switches) into a bounded-rate stream of heartbeats tagged with
//! file, language and project, and submits them to a local aw-server.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        aw-watcher-editor                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌─────────────┐   │
//! │  │  Bridge  │──▶│ Context  │──▶│ Heartbeat │──▶│ RateLimiter │   │
//! │  │  (HTTP)  │   │ Resolver │   │  Builder  │   │             │   │
//! │  └──────────┘   └──────────┘   └───────────┘   └─────────────┘   │
//! │        │                                             │           │
//! │        ▼                                             ▼           │
//! │  ┌──────────┐                                  ┌───────────┐     │
//! │  │Controller│─────── bucket / heartbeats ─────▶│ aw-server │     │
//! │  └──────────┘                                  └───────────┘     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Delivery is at-most-once: a heartbeat that fails to submit is logged and
//! dropped, never retried.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use aw_watcher_editor::{
//!     AwClient, BucketIdentity, ConfigSource, Controller, EditorState, StoreConfig,
//! };
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(AwClient::new(StoreConfig::default())?);
//! let mut controller = Controller::new(
//!     BucketIdentity::detect(),
//!     store,
//!     EditorState::new(),
//!     ConfigSource::File(aw_watcher_editor::Config::config_path()),
//! );
//!
//! let (tx, rx) = tokio::sync::mpsc::channel(256);
//! // Hand `tx` to the editor bridge, then:
//! controller.run(rx).await;
//! # drop(tx);
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod bucket;
pub mod config;
pub mod context;
pub mod controller;
pub mod core;
pub mod stats;
pub mod store;

// Re-export key types at crate root for convenience
pub use bucket::{BucketIdentity, CLIENT_NAME, EVENT_TYPE};
pub use config::{Config, ConfigError, ConfigSource};
pub use context::{
    ActiveDocument, ContextError, ContextResolver, EditorEventKind, EditorHost, EditorState,
    EditorUpdate,
};
pub use controller::{Controller, EditorListener, HostMessage, WatcherState, WatcherStatus};
pub use core::{DispatchDecision, HeartbeatBuilder, HeartbeatRecord, RateLimiter};
pub use stats::{DispatchStats, StatsSnapshot};
pub use store::{AwClient, EventStore, StoreConfig, StoreError, PULSE_WINDOW_SECS};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
