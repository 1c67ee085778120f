//! Log tail controller.
//!
//! [`LogTailController`] owns at most one live tail session. `start()`
//! mints a session token and spawns a task that opens the stream, decodes
//! each chunk with a session-local [`Utf8StreamDecoder`] and appends it to
//! the shared [`LogBuffer`]. Every mutation made by the task is guarded by
//! its token: once `stop()` supersedes the session, late chunks are
//! dropped, so nothing is appended after `stop()` returns.
//!
//! Failures never escape the controller. They end the session with a
//! sentinel line in the buffer. A failed tail is not retried; the operator
//! restarts it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use xrayops_core::session::{Generation, SessionStatus, SessionToken};
use xrayops_core::CoreError;

use crate::buffer::LogBuffer;
use crate::decoder::Utf8StreamDecoder;
use crate::error::LogTailError;
use crate::export::ExportedLog;
use crate::source::{HttpLogSource, LogSource};

/// Broadcast channel capacity for tail events. Slow subscribers lag and
/// miss fragments; the buffer stays authoritative.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Default line count for one-shot refreshes.
pub const DEFAULT_LINE_LIMIT: u32 = 100;

/// Largest line count the refresh endpoint accepts.
pub const MAX_LINE_LIMIT: u32 = 1000;

pub const ENDED_SENTINEL: &str = "\n[stream ended]\n";
pub const STOPPED_SENTINEL: &str = "\n[stream stopped]\n";

/// Sentinel appended when the transport fails.
pub fn error_sentinel(reason: &str) -> String {
    format!("\n[stream error: {reason}]\n")
}

/// Change notifications for the log view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailEvent {
    /// Text was appended to the buffer.
    Appended(String),
    /// The buffer was emptied (clear, new session or refresh).
    Cleared,
    /// The session moved to a new status.
    StatusChanged(SessionStatus),
}

struct TailState {
    buffer: LogBuffer,
    status: SessionStatus,
    generation: Generation,
    session_id: Option<Uuid>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
    line_limit: u32,
}

struct TailShared {
    state: Mutex<TailState>,
    events: broadcast::Sender<TailEvent>,
}

impl TailShared {
    fn lock(&self) -> MutexGuard<'_, TailState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: TailEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}

/// Streaming log tail with start/stop/clear/export controls.
///
/// All controls take `&self`; `start()` must be called from within a
/// Tokio runtime. Dropping the controller stops any live session.
pub struct LogTailController<S: LogSource = HttpLogSource> {
    source: Arc<S>,
    shared: Arc<TailShared>,
}

impl<S: LogSource> LogTailController<S> {
    pub fn new(source: S) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = TailState {
            buffer: LogBuffer::new(),
            status: SessionStatus::Idle,
            generation: Generation::new(),
            session_id: None,
            cancel: None,
            task: None,
            line_limit: DEFAULT_LINE_LIMIT,
        };
        Self {
            source: Arc::new(source),
            shared: Arc::new(TailShared {
                state: Mutex::new(state),
                events,
            }),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TailEvent> {
        self.shared.events.subscribe()
    }

    /// Begin a new tail session.
    ///
    /// Returns [`LogTailError::AlreadyActive`] without touching the buffer or
    /// the current session when one is live. Otherwise clears the buffer and
    /// returns the new session id.
    pub fn start(&self) -> Result<Uuid, LogTailError> {
        let mut state = self.shared.lock();
        if state.status.is_live() {
            tracing::debug!(session = ?state.session_id, "Tail already active, ignoring start");
            return Err(LogTailError::AlreadyActive);
        }

        state.buffer.clear();
        let token = state.generation.mint();
        let session_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        state.session_id = Some(session_id);
        state.cancel = Some(cancel.clone());
        state.status = SessionStatus::Connecting;
        self.shared.emit(TailEvent::Cleared);
        self.shared
            .emit(TailEvent::StatusChanged(SessionStatus::Connecting));

        let session = Session {
            shared: Arc::clone(&self.shared),
            token,
            id: session_id,
        };
        state.task = Some(tokio::spawn(run_session(
            Arc::clone(&self.source),
            session,
            cancel,
        )));

        tracing::info!(session = %session_id, "Log tail started");
        Ok(session_id)
    }

    /// Stop the live session. A no-op when nothing is live.
    ///
    /// The session is superseded before this returns; the reading task
    /// releases the stream at its next suspension point.
    pub fn stop(&self) {
        let mut state = self.shared.lock();
        if !state.status.is_live() {
            return;
        }

        if let Some(cancel) = state.cancel.take() {
            cancel.cancel();
        }
        state.generation.invalidate();
        state.buffer.append(STOPPED_SENTINEL);
        state.status = SessionStatus::Stopped;
        self.shared
            .emit(TailEvent::Appended(STOPPED_SENTINEL.to_string()));
        self.shared
            .emit(TailEvent::StatusChanged(SessionStatus::Stopped));

        tracing::info!(session = ?state.session_id, "Log tail stopped");
    }

    /// Empty the buffer. A live session keeps appending afterwards.
    pub fn clear(&self) {
        self.shared.lock().buffer.clear();
        self.shared.emit(TailEvent::Cleared);
    }

    /// The buffer so far, as one string.
    pub fn export(&self) -> String {
        self.shared.lock().buffer.export()
    }

    /// The buffer so far, named for download.
    pub fn export_file(&self) -> ExportedLog {
        ExportedLog::new(self.export(), Utc::now())
    }

    /// Line count for the next [`refresh`](Self::refresh), clamped to
    /// `1..=MAX_LINE_LIMIT`. Does not affect a live tail.
    pub fn set_line_limit(&self, lines: u32) {
        self.shared.lock().line_limit = lines.clamp(1, MAX_LINE_LIMIT);
    }

    pub fn line_limit(&self) -> u32 {
        self.shared.lock().line_limit
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.lock().status
    }

    /// Id of the most recent session, live or not.
    pub fn session_id(&self) -> Option<Uuid> {
        self.shared.lock().session_id
    }

    /// Replace the buffer with the last `line_limit` lines.
    ///
    /// Refused while a tail is live, since the tail owns the buffer.
    /// A tail started while the request is in flight supersedes the
    /// refresh, whose result is then discarded with
    /// [`LogTailError::AlreadyActive`]. Returns the new buffer length in
    /// bytes.
    pub async fn refresh(&self) -> Result<usize, LogTailError> {
        let (token, lines) = {
            let mut state = self.shared.lock();
            if state.status.is_live() {
                return Err(LogTailError::AlreadyActive);
            }
            (state.generation.mint(), state.line_limit)
        };

        let recent = self.source.fetch_recent(lines).await?;
        if !recent.success {
            return Err(LogTailError::Refresh("backend reported failure".into()));
        }

        let mut state = self.shared.lock();
        if !state.generation.is_current(token) {
            tracing::debug!(lines, "Discarding refresh superseded by a tail session");
            return Err(LogTailError::AlreadyActive);
        }
        state.buffer.replace(&recent.logs);
        self.shared.emit(TailEvent::Cleared);
        self.shared.emit(TailEvent::Appended(recent.logs));

        tracing::debug!(lines, bytes = state.buffer.len(), "Log buffer refreshed");
        Ok(state.buffer.len())
    }

    /// Wait for the most recent session task to exit.
    pub async fn join(&self) {
        let task = self.shared.lock().task.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Log tail task failed");
            }
        }
    }
}

impl<S: LogSource> Drop for LogTailController<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---- session task ----

/// Handle through which a session task mutates shared state.
struct Session {
    shared: Arc<TailShared>,
    token: SessionToken,
    id: Uuid,
}

impl Session {
    fn mark_active(&self) -> bool {
        let mut state = self.shared.lock();
        if !state.generation.is_current(self.token) {
            return false;
        }
        state.status = SessionStatus::Active;
        self.shared
            .emit(TailEvent::StatusChanged(SessionStatus::Active));
        true
    }

    /// Append decoded text. Returns `false` once the session is superseded.
    fn append(&self, text: &str) -> bool {
        let mut state = self.shared.lock();
        if !state.generation.is_current(self.token) {
            tracing::trace!(session = %self.id, "Discarding chunk from superseded session");
            return false;
        }
        if !text.is_empty() {
            state.buffer.append(text);
            self.shared.emit(TailEvent::Appended(text.to_owned()));
        }
        true
    }

    /// Flush trailing text, append the sentinel and enter a terminal status.
    fn finish(&self, trailing: &str, sentinel: &str, status: SessionStatus) {
        let mut state = self.shared.lock();
        if !state.generation.is_current(self.token) {
            return;
        }
        state.generation.invalidate();
        state.cancel = None;

        for text in [trailing, sentinel] {
            if !text.is_empty() {
                state.buffer.append(text);
                self.shared.emit(TailEvent::Appended(text.to_owned()));
            }
        }
        state.status = status;
        self.shared.emit(TailEvent::StatusChanged(status));
    }
}

/// Open the stream and pump it into the buffer until it ends, fails, or
/// the session is cancelled.
async fn run_session<S: LogSource>(source: Arc<S>, session: Session, cancel: CancellationToken) {
    let opened = tokio::select! {
        _ = cancel.cancelled() => return,
        result = source.open_stream() => result,
    };

    let mut stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            let reason = e.to_string();
            let error = CoreError::from(e);
            tracing::warn!(
                session = %session.id,
                %error,
                transient = error.is_transient(),
                "Failed to open log stream",
            );
            session.finish("", &error_sentinel(&reason), SessionStatus::Errored);
            return;
        }
    };

    if !session.mark_active() {
        return;
    }
    tracing::info!(session = %session.id, "Log stream active");

    let mut decoder = Utf8StreamDecoder::new();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(session = %session.id, "Log stream cancelled, releasing");
                return;
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                tracing::trace!(session = %session.id, bytes = chunk.len(), "Log chunk received");
                let text = decoder.decode(&chunk);
                if !session.append(&text) {
                    return;
                }
            }
            Some(Err(e)) => {
                let reason = e.to_string();
                let error = CoreError::from(e);
                tracing::warn!(
                    session = %session.id,
                    %error,
                    transient = error.is_transient(),
                    "Log stream interrupted",
                );
                let trailing = decoder.finish();
                session.finish(&trailing, &error_sentinel(&reason), SessionStatus::Errored);
                return;
            }
            None => {
                tracing::info!(session = %session.id, "Log stream ended by server");
                let trailing = decoder.finish();
                session.finish(&trailing, ENDED_SENTINEL, SessionStatus::Ended);
                return;
            }
        }
    }
}
