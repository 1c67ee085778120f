//! Statistics feed controller.
//!
//! [`StatsFeedController`] keeps one persistent socket to the statistics
//! endpoint and republishes the latest [`StatsSnapshot`]. A background
//! task runs the connect -> process -> wait -> reconnect loop described in
//! [`crate::reconnect`]. Each socket is a session with its own token; a
//! message is applied only while its session is still current, so nothing
//! from an old socket can overwrite newer state after a reconnect or a
//! `disconnect()`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use xrayops_core::session::{Generation, SessionToken};
use xrayops_core::snapshot::{ConnectionHealth, StatsSnapshot};
use xrayops_core::CoreError;

use crate::client::{FeedError, FeedTransport, WsFeedClient};
use crate::events::FeedEvent;
use crate::processor::{process_frames, SocketOutcome};
use crate::reconnect::{FeedState, ReconnectPolicy};

/// Broadcast channel capacity for feed events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

struct FeedInner {
    state: FeedState,
    generation: Generation,
    snapshot: Option<Arc<StatsSnapshot>>,
    last_error: Option<String>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

pub(crate) struct FeedShared {
    inner: Mutex<FeedInner>,
    events: broadcast::Sender<FeedEvent>,
}

impl FeedShared {
    fn lock(&self) -> MutexGuard<'_, FeedInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: FeedEvent) {
        let _ = self.events.send(event);
    }

    /// Mint a session for the next socket. `None` once terminated.
    fn begin_attempt(self: &Arc<Self>) -> Option<FeedSession> {
        let mut inner = self.lock();
        if inner.state == FeedState::Terminated {
            return None;
        }
        let token = inner.generation.mint();
        inner.state = FeedState::Connecting;
        Some(FeedSession {
            shared: Arc::clone(self),
            token,
        })
    }
}

/// One socket's view of the controller.
pub(crate) struct FeedSession {
    shared: Arc<FeedShared>,
    token: SessionToken,
}

impl FeedSession {
    pub(crate) fn token(&self) -> SessionToken {
        self.token
    }

    /// Replace the snapshot wholesale. Returns `false` when superseded.
    pub(crate) fn apply_snapshot(&self, data: serde_json::Value) -> bool {
        let mut inner = self.shared.lock();
        if !inner.generation.is_current(self.token) {
            tracing::debug!(session = self.token.get(), "Dropping message from superseded socket");
            return false;
        }
        let snapshot = Arc::new(StatsSnapshot::new(data, Utc::now()));
        inner.snapshot = Some(Arc::clone(&snapshot));
        self.shared.emit(FeedEvent::SnapshotUpdated(snapshot));
        true
    }

    fn mark_connected(&self) -> bool {
        let mut inner = self.shared.lock();
        if !inner.generation.is_current(self.token) {
            return false;
        }
        inner.state = FeedState::Connected;
        inner.last_error = None;
        self.shared.emit(FeedEvent::Connected);
        true
    }

    fn mark_pending_retry(&self, attempt: u32, reason: String) -> bool {
        let mut inner = self.shared.lock();
        if !inner.generation.is_current(self.token) {
            return false;
        }
        inner.state = FeedState::PendingRetry { attempt };
        inner.last_error = Some(reason.clone());
        self.shared.emit(FeedEvent::Disconnected { reason });
        true
    }
}

/// Always-on statistics feed with automatic reconnection.
///
/// `connect()` must be called from within a Tokio runtime. Dropping the
/// controller disconnects it.
pub struct StatsFeedController<T: FeedTransport = WsFeedClient> {
    transport: Arc<T>,
    policy: ReconnectPolicy,
    shared: Arc<FeedShared>,
}

impl<T: FeedTransport> StatsFeedController<T> {
    pub fn new(transport: T) -> Self {
        Self::with_policy(transport, ReconnectPolicy::default())
    }

    pub fn with_policy(transport: T, policy: ReconnectPolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let inner = FeedInner {
            state: FeedState::Disconnected,
            generation: Generation::new(),
            snapshot: None,
            last_error: None,
            cancel: None,
            task: None,
        };
        Self {
            transport: Arc::new(transport),
            policy,
            shared: Arc::new(FeedShared {
                inner: Mutex::new(inner),
                events,
            }),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Subscribe to connection and snapshot events.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.shared.events.subscribe()
    }

    /// Start the connection loop.
    ///
    /// A no-op while the loop is already running. Fails with
    /// [`FeedError::Terminated`] after [`disconnect`](Self::disconnect).
    pub fn connect(&self) -> Result<(), FeedError> {
        let mut inner = self.shared.lock();
        match inner.state {
            FeedState::Terminated => return Err(FeedError::Terminated),
            state if state.is_running() => {
                tracing::debug!(?state, "Stats feed already running, ignoring connect");
                return Ok(());
            }
            _ => {}
        }

        let cancel = CancellationToken::new();
        inner.cancel = Some(cancel.clone());
        inner.state = FeedState::Connecting;
        inner.task = Some(tokio::spawn(run_feed_loop(
            Arc::clone(&self.transport),
            Arc::clone(&self.shared),
            self.policy,
            cancel,
        )));

        tracing::info!("Stats feed started");
        Ok(())
    }

    /// Tear the controller down for good.
    ///
    /// Cancels a pending retry, closes an open socket and guarantees that
    /// no further reconnection is scheduled. Safe to call repeatedly.
    pub fn disconnect(&self) {
        let mut inner = self.shared.lock();
        if inner.state == FeedState::Terminated {
            return;
        }

        inner.state = FeedState::Terminated;
        inner.generation.invalidate();
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
        }
        self.shared.emit(FeedEvent::Terminated);

        tracing::info!("Stats feed disconnected");
    }

    /// The latest snapshot, or `None` if none has arrived yet.
    pub fn current_snapshot(&self) -> Option<Arc<StatsSnapshot>> {
        self.shared.lock().snapshot.clone()
    }

    pub fn state(&self) -> FeedState {
        self.shared.lock().state
    }

    pub fn health(&self) -> ConnectionHealth {
        let inner = self.shared.lock();
        if inner.state.is_connected() {
            ConnectionHealth::connected()
        } else {
            ConnectionHealth::disconnected(inner.last_error.clone())
        }
    }

    /// Wait for the connection loop to exit (after `disconnect()`).
    pub async fn join(&self) {
        let task = self.shared.lock().task.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Stats feed task failed");
            }
        }
    }
}

impl<T: FeedTransport> Drop for StatsFeedController<T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Core connection loop: connect -> process frames -> wait -> reconnect.
///
/// Runs until `cancel` fires or the controller supersedes the session.
async fn run_feed_loop<T: FeedTransport>(
    transport: Arc<T>,
    shared: Arc<FeedShared>,
    policy: ReconnectPolicy,
    cancel: CancellationToken,
) {
    let mut failures: u32 = 0;

    loop {
        let Some(session) = shared.begin_attempt() else {
            return;
        };
        let id = session.token().get();

        let opened = tokio::select! {
            _ = cancel.cancelled() => return,
            result = transport.connect() => result,
        };

        let reason = match opened {
            Ok(mut frames) => {
                if !session.mark_connected() {
                    return;
                }
                failures = 0;
                tracing::info!(session = id, "Stats feed connected");

                match process_frames(&mut frames, &session, &cancel).await {
                    SocketOutcome::Closed(reason) => reason,
                    SocketOutcome::Cancelled | SocketOutcome::Superseded => return,
                }
            }
            Err(e) => {
                let reason = e.to_string();
                let error = CoreError::from(e);
                tracing::warn!(
                    session = id,
                    %error,
                    transient = error.is_transient(),
                    "Stats feed connection failed",
                );
                reason
            }
        };

        failures = failures.saturating_add(1);
        if !session.mark_pending_retry(failures, reason) {
            return;
        }

        tracing::info!(
            attempt = failures,
            delay_ms = policy.delay.as_millis() as u64,
            "Reconnecting to stats feed",
        );
        if !policy.wait(&cancel).await {
            tracing::info!("Reconnect cancelled");
            return;
        }
    }
}
