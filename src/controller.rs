//! The watcher controller.
//!
//! Owns the bucket identity, the rate limiter and the editor view, reacts to
//! editor notifications and drives the event store.
//!
//! # States
//!
//! ```text
//! Uninitialized ──start()──▶ BucketPending ──ok──▶ Ready
//!                                 │  ▲               │
//!                               error└──reload()─────┤
//!                                 ▼     │            │
//!                               Failed ─┘            │
//!                                 ▲──────reload()────┘ (via BucketPending)
//! ```
//!
//! `stop()` moves any state to `Stopped`, which is final.
//!
//! Only `Ready` dispatches. Events arriving in any other state are dropped.
//! Bucket creation completes on a spawned task and reports back through a
//! channel tagged with the epoch it was issued under, so a completion from
//! before a reload can never overwrite the outcome of the newer attempt.

use crate::bucket::BucketIdentity;
use crate::config::ConfigSource;
use crate::context::{ContextResolver, EditorEventKind, EditorHost, EditorState, EditorUpdate};
use crate::core::{DispatchDecision, HeartbeatBuilder, HeartbeatRecord, RateLimiter};
use crate::stats::{create_shared_stats, SharedDispatchStats, StatsSnapshot};
use crate::store::{EventStore, StoreError, PULSE_WINDOW_SECS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

/// Shown to the user when the bucket cannot be created.
pub const BUCKET_FAILURE_MESSAGE: &str = "Couldn't create bucket. Please make sure the server is running properly and then run the reload command.";

/// Lifecycle state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatcherState {
    Uninitialized,
    BucketPending,
    Ready,
    Failed,
    Stopped,
}

/// Published view of the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatcherStatus {
    pub state: WatcherState,
    pub epoch: u64,
    pub bucket_id: String,
    pub max_heartbeats_per_sec: f64,
    /// Last critical error, cleared once the bucket is created
    pub critical_error: Option<String>,
    pub stats: StatsSnapshot,
}

/// Messages from the editor side into the controller loop.
#[derive(Debug, Clone)]
pub enum HostMessage {
    /// Editor state changed; apply the update, then evaluate
    Editor {
        kind: EditorEventKind,
        update: EditorUpdate,
    },
    /// Re-run initialization
    Reload,
    /// Shut down the loop
    Stop,
}

/// Receiver of editor notifications.
pub trait EditorListener {
    fn on_selection_changed(&mut self);
    fn on_active_document_changed(&mut self);
}

#[derive(Debug)]
struct BucketCompletion {
    epoch: u64,
    result: Result<(), StoreError>,
}

/// Decides which editor events become heartbeats and sends them.
pub struct Controller<H: EditorHost = EditorState> {
    identity: Arc<BucketIdentity>,
    store: Arc<dyn EventStore>,
    host: H,
    builder: HeartbeatBuilder,
    limiter: RateLimiter,
    config_source: ConfigSource,
    state: WatcherState,
    epoch: u64,
    critical_error: Option<String>,
    stats: SharedDispatchStats,
    in_flight: JoinSet<()>,
    completions_tx: mpsc::UnboundedSender<BucketCompletion>,
    completions_rx: mpsc::UnboundedReceiver<BucketCompletion>,
    status_tx: watch::Sender<WatcherStatus>,
}

impl<H: EditorHost> Controller<H> {
    /// Create a controller. Nothing is sent until [`Controller::start`].
    pub fn new(
        identity: BucketIdentity,
        store: Arc<dyn EventStore>,
        host: H,
        config_source: ConfigSource,
    ) -> Self {
        let config = config_source.load();
        let limiter = RateLimiter::new(config.effective_max_heartbeats_per_sec());
        let stats = create_shared_stats();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = watch::channel(WatcherStatus {
            state: WatcherState::Uninitialized,
            epoch: 0,
            bucket_id: identity.id().to_string(),
            max_heartbeats_per_sec: limiter.max_per_sec(),
            critical_error: None,
            stats: stats.snapshot(),
        });

        Self {
            identity: Arc::new(identity),
            store,
            host,
            builder: HeartbeatBuilder::new(),
            limiter,
            config_source,
            state: WatcherState::Uninitialized,
            epoch: 0,
            critical_error: None,
            stats,
            in_flight: JoinSet::new(),
            completions_tx,
            completions_rx,
            status_tx,
        }
    }

    pub fn identity(&self) -> &BucketIdentity {
        &self.identity
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    pub fn is_bucket_ready(&self) -> bool {
        self.state == WatcherState::Ready
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn critical_error(&self) -> Option<&str> {
        self.critical_error.as_deref()
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn stats(&self) -> &SharedDispatchStats {
        &self.stats
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<WatcherStatus> {
        self.status_tx.subscribe()
    }

    /// Current status.
    pub fn status(&self) -> WatcherStatus {
        WatcherStatus {
            state: self.state,
            epoch: self.epoch,
            bucket_id: self.identity.id().to_string(),
            max_heartbeats_per_sec: self.limiter.max_per_sec(),
            critical_error: self.critical_error.clone(),
            stats: self.stats.snapshot(),
        }
    }

    /// First initialization. Does nothing if already started.
    pub fn start(&mut self) {
        if self.state != WatcherState::Uninitialized {
            tracing::debug!(state = ?self.state, "Controller already started");
            return;
        }
        self.init();
    }

    /// Re-run initialization: reload config and create the bucket again.
    ///
    /// Safe to call repeatedly; older bucket-creation attempts still in
    /// flight are ignored when they complete.
    pub fn reload(&mut self) {
        if self.state == WatcherState::Stopped {
            tracing::debug!("Ignoring reload of a stopped controller");
            return;
        }
        tracing::info!("Reloading watcher");
        self.init();
    }

    fn init(&mut self) {
        self.epoch += 1;
        self.state = WatcherState::BucketPending;

        let store = Arc::clone(&self.store);
        let identity = Arc::clone(&self.identity);
        let tx = self.completions_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = store.create_bucket(&identity).await;
            // The receiver lives as long as the controller.
            let _ = tx.send(BucketCompletion { epoch, result });
        });

        // No event is evaluated until the bucket settles.
        let config = self.config_source.load();
        self.limiter
            .set_max_per_sec(config.effective_max_heartbeats_per_sec());
        self.limiter.reset();

        tracing::debug!(epoch, bucket = self.identity.id(), "Bucket creation requested");
        self.publish();
    }

    fn settle(&mut self, completion: BucketCompletion) {
        if self.state == WatcherState::Stopped {
            tracing::debug!(epoch = completion.epoch, "Ignoring bucket completion after stop");
            return;
        }
        if completion.epoch != self.epoch {
            tracing::debug!(
                stale = completion.epoch,
                current = self.epoch,
                "Ignoring stale bucket completion"
            );
            return;
        }

        match completion.result {
            Ok(()) => {
                tracing::info!(bucket = self.identity.id(), "Created bucket");
                self.state = WatcherState::Ready;
                self.critical_error = None;
            }
            Err(e) => {
                tracing::error!("{BUCKET_FAILURE_MESSAGE} ({e})");
                self.state = WatcherState::Failed;
                self.critical_error = Some(BUCKET_FAILURE_MESSAGE.to_string());
            }
        }
        self.publish();
    }

    /// Apply any bucket completions that have already arrived.
    fn settle_pending(&mut self) {
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.settle(completion);
        }
    }

    /// Wait for the next bucket completion and apply it.
    pub async fn settle_next(&mut self) {
        if let Some(completion) = self.completions_rx.recv().await {
            self.settle(completion);
        }
    }

    /// Wait until the current bucket-creation attempt has completed.
    pub async fn wait_until_settled(&mut self) -> WatcherState {
        while self.state == WatcherState::BucketPending {
            self.settle_next().await;
        }
        self.state
    }

    /// Evaluate the current editor state now.
    pub fn on_event(&mut self) -> Option<DispatchDecision> {
        self.handle_event_at(Utc::now())
    }

    /// Evaluate the current editor state as of `now`.
    ///
    /// Returns the limiter's decision, or `None` if the event was dropped
    /// before reaching it. Never fails: resolution errors are logged.
    pub fn handle_event_at(&mut self, now: DateTime<Utc>) -> Option<DispatchDecision> {
        let decision = self.evaluate(now);
        self.publish();
        decision
    }

    fn evaluate(&mut self, now: DateTime<Utc>) -> Option<DispatchDecision> {
        self.stats.record_event();
        while self.in_flight.try_join_next().is_some() {}
        self.settle_pending();

        if self.state != WatcherState::Ready {
            self.stats.record_dropped_not_ready();
            return None;
        }

        let resolver = ContextResolver::new(&self.host);
        let record = match self.builder.build_from(&resolver, now) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Skipping editor event: {e}");
                self.stats.record_resolution_failure();
                return None;
            }
        };

        let decision = self.limiter.decide(&record.data.file, now);
        if decision.should_dispatch() {
            self.dispatch(record);
        } else {
            self.stats.record_suppressed();
        }
        Some(decision)
    }

    fn dispatch(&mut self, record: HeartbeatRecord) {
        self.stats.record_dispatched();

        let store = Arc::clone(&self.store);
        let identity = Arc::clone(&self.identity);
        let stats = Arc::clone(&self.stats);
        self.in_flight.spawn(async move {
            match store
                .heartbeat(identity.id(), PULSE_WINDOW_SECS, &record)
                .await
            {
                Ok(()) => {
                    stats.record_submission_ok();
                    tracing::debug!(file = %record.data.file, "Sent heartbeat");
                }
                Err(e) => {
                    stats.record_submission_failure();
                    tracing::warn!("Error while sending heartbeat: {e}");
                }
            }
        });
    }

    /// Wait for every heartbeat submission issued so far.
    pub async fn flush(&mut self) {
        while self.in_flight.join_next().await.is_some() {}
    }

    /// Stop dispatching, wait for in-flight submissions and log a summary.
    ///
    /// Later events are dropped and late bucket completions are ignored.
    pub async fn stop(&mut self) {
        self.state = WatcherState::Stopped;
        self.flush().await;
        self.publish();
        tracing::info!("{}", self.stats.summary());
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status());
    }
}

impl<H: EditorHost> EditorListener for Controller<H> {
    fn on_selection_changed(&mut self) {
        self.on_event();
    }

    fn on_active_document_changed(&mut self) {
        self.on_event();
    }
}

impl Controller<EditorState> {
    /// Run until a [`HostMessage::Stop`] arrives or every sender is gone.
    ///
    /// Starts the controller, applies editor updates in arrival order and
    /// stops cleanly on exit.
    pub async fn run(&mut self, mut messages: mpsc::Receiver<HostMessage>) {
        self.start();

        loop {
            tokio::select! {
                Some(completion) = self.completions_rx.recv() => self.settle(completion),
                message = messages.recv() => match message {
                    Some(HostMessage::Editor { kind, update }) => {
                        self.host.apply(update);
                        match kind {
                            EditorEventKind::SelectionChanged => self.on_selection_changed(),
                            EditorEventKind::ActiveEditorChanged => self.on_active_document_changed(),
                        }
                    }
                    Some(HostMessage::Reload) => self.reload(),
                    Some(HostMessage::Stop) | None => break,
                },
            }
        }

        // Release the subscription before draining.
        messages.close();
        self.stop().await;
    }
}
