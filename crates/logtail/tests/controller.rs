//! Behaviour tests for `LogTailController`.
//!
//! The controller runs against an in-memory `LogSource` whose streams are
//! fed through unbounded channels, so each test decides exactly when chunks
//! arrive, when the server closes, and when the transport fails.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use assert_matches::assert_matches;
use bytes::Bytes;
use futures::channel::{mpsc, oneshot};
use futures::StreamExt;
use tokio::sync::broadcast;
use xrayops_core::session::SessionStatus;
use xrayops_logtail::controller::{ENDED_SENTINEL, STOPPED_SENTINEL};
use xrayops_logtail::{ChunkStream, LogSource, LogTailController, LogTailError, RecentLogs, TailEvent};

// ---------------------------------------------------------------------------
// Fake source
// ---------------------------------------------------------------------------

type ChunkSender = mpsc::UnboundedSender<Result<Bytes, LogTailError>>;

#[derive(Default)]
struct FakeSource {
    streams: Mutex<VecDeque<Result<ChunkStream, LogTailError>>>,
    recent: Mutex<Option<RecentLogs>>,
    recent_gate: Mutex<Option<oneshot::Receiver<()>>>,
    opens: AtomicUsize,
    requested_lines: AtomicU32,
}

impl FakeSource {
    /// Queue a stream for the next `open_stream` and return its feeding end.
    fn push_stream(&self) -> ChunkSender {
        let (tx, rx) = mpsc::unbounded();
        self.streams.lock().unwrap().push_back(Ok(rx.boxed()));
        tx
    }

    fn push_open_error(&self, err: LogTailError) {
        self.streams.lock().unwrap().push_back(Err(err));
    }

    fn set_recent(&self, logs: &str, success: bool) {
        *self.recent.lock().unwrap() = Some(RecentLogs {
            success,
            logs: logs.to_string(),
            lines: None,
            timestamp: None,
        });
    }

    /// Hold the next `fetch_recent` until the returned sender fires.
    fn gate_recent(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.recent_gate.lock().unwrap() = Some(rx);
        tx
    }
}

#[async_trait::async_trait]
impl LogSource for FakeSource {
    async fn open_stream(&self) -> Result<ChunkStream, LogTailError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LogTailError::Stream("no stream queued".into())))
    }

    async fn fetch_recent(&self, lines: u32) -> Result<RecentLogs, LogTailError> {
        self.requested_lines.store(lines, Ordering::SeqCst);
        let gate = self.recent_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.recent
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| LogTailError::Refresh("nothing queued".into()))
    }
}

fn setup() -> LogTailController<FakeSource> {
    LogTailController::new(FakeSource::default())
}

fn chunk(bytes: &[u8]) -> Result<Bytes, LogTailError> {
    Ok(Bytes::copy_from_slice(bytes))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn wait_for_status(rx: &mut broadcast::Receiver<TailEvent>, wanted: SessionStatus) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await {
                Ok(TailEvent::StatusChanged(status)) if status == wanted => return,
                Ok(_) => {}
                Err(e) => panic!("event channel failed: {e}"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {wanted}"));
}

async fn wait_for_append(rx: &mut broadcast::Receiver<TailEvent>, wanted: &str) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await {
                Ok(TailEvent::Appended(text)) if text == wanted => return,
                Ok(_) => {}
                Err(e) => panic!("event channel failed: {e}"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for append {wanted:?}"));
}

async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn appended_chunks_export_in_order() {
    let controller = setup();
    let source = controller.source();
    let tx = source.push_stream();
    let mut rx = controller.subscribe();

    controller.start().unwrap();
    wait_for_status(&mut rx, SessionStatus::Active).await;

    tx.unbounded_send(chunk(b"ab")).unwrap();
    wait_for_append(&mut rx, "ab").await;
    tx.unbounded_send(chunk(b"cd")).unwrap();
    wait_for_append(&mut rx, "cd").await;

    assert_eq!(controller.export(), "abcd");
    assert_eq!(controller.status(), SessionStatus::Active);
}

#[tokio::test]
async fn no_append_after_stop_returns() {
    let controller = setup();
    let source = controller.source();
    let tx = source.push_stream();
    let mut rx = controller.subscribe();

    controller.start().unwrap();
    wait_for_status(&mut rx, SessionStatus::Active).await;
    tx.unbounded_send(chunk(b"ab")).unwrap();
    wait_for_append(&mut rx, "ab").await;

    controller.stop();
    let after_stop = controller.export();
    assert_eq!(after_stop, format!("ab{STOPPED_SENTINEL}"));
    assert_eq!(controller.status(), SessionStatus::Stopped);

    // A chunk still in flight from the network.
    let _ = tx.unbounded_send(chunk(b"late"));
    settle().await;

    assert_eq!(controller.export(), after_stop);
    controller.join().await;
    assert!(tx.is_closed(), "stream should be released after stop");
}

#[tokio::test]
async fn start_while_active_is_a_noop() {
    let controller = setup();
    let source = controller.source();
    let tx = source.push_stream();
    let mut rx = controller.subscribe();

    let first = controller.start().unwrap();
    wait_for_status(&mut rx, SessionStatus::Active).await;
    tx.unbounded_send(chunk(b"keep me")).unwrap();
    wait_for_append(&mut rx, "keep me").await;

    assert_matches!(controller.start(), Err(LogTailError::AlreadyActive));
    assert_eq!(controller.session_id(), Some(first));
    assert_eq!(controller.export(), "keep me");
    settle().await;
    assert_eq!(source.opens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn start_while_connecting_is_a_noop() {
    let controller = setup();
    let source = controller.source();
    let _tx = source.push_stream();

    let first = controller.start().unwrap();
    assert_eq!(controller.status(), SessionStatus::Connecting);
    assert_matches!(controller.start(), Err(LogTailError::AlreadyActive));
    assert_eq!(controller.session_id(), Some(first));
}

#[tokio::test]
async fn multibyte_character_split_across_chunks() {
    let controller = setup();
    let source = controller.source();
    let tx = source.push_stream();
    let mut rx = controller.subscribe();

    controller.start().unwrap();
    wait_for_status(&mut rx, SessionStatus::Active).await;

    // "ệ" is E1 BB 87.
    tx.unbounded_send(chunk(&[b'x', 0xE1, 0xBB])).unwrap();
    wait_for_append(&mut rx, "x").await;
    tx.unbounded_send(chunk(&[0x87])).unwrap();
    wait_for_append(&mut rx, "ệ").await;

    assert_eq!(controller.export(), "xệ");
}

#[tokio::test]
async fn malformed_bytes_do_not_end_the_session() {
    let controller = setup();
    let source = controller.source();
    let tx = source.push_stream();
    let mut rx = controller.subscribe();

    controller.start().unwrap();
    wait_for_status(&mut rx, SessionStatus::Active).await;

    tx.unbounded_send(chunk(b"ok\xFFgo")).unwrap();
    wait_for_append(&mut rx, "ok\u{FFFD}go").await;

    assert_eq!(controller.status(), SessionStatus::Active);
}

#[tokio::test]
async fn server_close_appends_ended_sentinel() {
    let controller = setup();
    let source = controller.source();
    let tx = source.push_stream();
    let mut rx = controller.subscribe();

    controller.start().unwrap();
    wait_for_status(&mut rx, SessionStatus::Active).await;
    tx.unbounded_send(chunk(b"last line\n")).unwrap();
    drop(tx);

    wait_for_status(&mut rx, SessionStatus::Ended).await;
    assert_eq!(controller.export(), format!("last line\n{ENDED_SENTINEL}"));

    // Stop after the end is a no-op.
    controller.stop();
    assert_eq!(controller.status(), SessionStatus::Ended);
}

#[tokio::test]
async fn read_error_appends_reason_and_errors() {
    let controller = setup();
    let source = controller.source();
    let tx = source.push_stream();
    let mut rx = controller.subscribe();

    controller.start().unwrap();
    wait_for_status(&mut rx, SessionStatus::Active).await;
    tx.unbounded_send(Err(LogTailError::Stream("connection reset".into())))
        .unwrap();

    wait_for_status(&mut rx, SessionStatus::Errored).await;
    let text = controller.export();
    assert!(text.contains("[stream error:"), "{text}");
    assert!(text.contains("connection reset"), "{text}");
}

#[tokio::test]
async fn initial_connection_failure_is_not_retried() {
    let controller = setup();
    let source = controller.source();
    source.push_open_error(LogTailError::HttpStatus {
        status: 503,
        body: "spark container down".into(),
    });
    let mut rx = controller.subscribe();

    controller.start().unwrap();
    wait_for_status(&mut rx, SessionStatus::Errored).await;
    settle().await;

    assert_eq!(source.opens.load(Ordering::SeqCst), 1);
    assert!(controller.export().contains("HTTP 503"));
}

#[tokio::test]
async fn restart_after_end_clears_buffer() {
    let controller = setup();
    let source = controller.source();
    let tx = source.push_stream();
    let mut rx = controller.subscribe();

    let first = controller.start().unwrap();
    wait_for_status(&mut rx, SessionStatus::Active).await;
    drop(tx);
    wait_for_status(&mut rx, SessionStatus::Ended).await;

    let tx2 = source.push_stream();
    let second = controller.start().unwrap();
    assert_ne!(first, second);
    assert_eq!(controller.export(), "");

    wait_for_status(&mut rx, SessionStatus::Active).await;
    tx2.unbounded_send(chunk(b"fresh")).unwrap();
    wait_for_append(&mut rx, "fresh").await;
    assert_eq!(controller.export(), "fresh");
}

#[tokio::test]
async fn clear_keeps_the_session_running() {
    let controller = setup();
    let source = controller.source();
    let tx = source.push_stream();
    let mut rx = controller.subscribe();

    controller.start().unwrap();
    wait_for_status(&mut rx, SessionStatus::Active).await;
    tx.unbounded_send(chunk(b"old ")).unwrap();
    wait_for_append(&mut rx, "old ").await;

    controller.clear();
    tx.unbounded_send(chunk(b"new")).unwrap();
    wait_for_append(&mut rx, "new").await;

    assert_eq!(controller.export(), "new");
    assert_eq!(controller.status(), SessionStatus::Active);
}

#[tokio::test]
async fn stop_when_idle_is_a_noop() {
    let controller = setup();
    controller.stop();
    assert_eq!(controller.status(), SessionStatus::Idle);
    assert_eq!(controller.export(), "");
}

#[tokio::test]
async fn export_file_snapshots_live_buffer() {
    let controller = setup();
    let source = controller.source();
    let tx = source.push_stream();
    let mut rx = controller.subscribe();

    controller.start().unwrap();
    wait_for_status(&mut rx, SessionStatus::Active).await;
    tx.unbounded_send(chunk(b"so far")).unwrap();
    wait_for_append(&mut rx, "so far").await;

    let export = controller.export_file();
    assert_eq!(export.contents, "so far");
    assert!(export.file_name.starts_with("spark-logs-"));
    assert!(export.file_name.ends_with(".txt"));
}

#[tokio::test]
async fn refresh_replaces_buffer_with_requested_lines() {
    let controller = setup();
    let source = controller.source();
    source.set_recent("line 1\nline 2\n", true);

    controller.set_line_limit(250);
    let len = controller.refresh().await.unwrap();

    assert_eq!(source.requested_lines.load(Ordering::SeqCst), 250);
    assert_eq!(len, 14);
    assert_eq!(controller.export(), "line 1\nline 2\n");
}

#[tokio::test]
async fn refresh_reports_backend_failure() {
    let controller = setup();
    let source = controller.source();
    source.set_recent("", false);
    assert_matches!(controller.refresh().await, Err(LogTailError::Refresh(_)));
}

#[tokio::test]
async fn refresh_refused_while_tailing() {
    let controller = setup();
    let source = controller.source();
    let _tx = source.push_stream();
    source.set_recent("snapshot", true);

    controller.start().unwrap();
    assert_matches!(controller.refresh().await, Err(LogTailError::AlreadyActive));
}

#[tokio::test]
async fn refresh_landing_after_a_finished_tail_is_discarded() {
    let controller = setup();
    let source = controller.source();
    source.set_recent("stale refresh\n", true);
    let release = source.gate_recent();
    let tx = source.push_stream();
    let mut rx = controller.subscribe();

    let refresh = controller.refresh();
    tokio::pin!(refresh);
    assert!(futures::poll!(&mut refresh).is_pending());

    controller.start().unwrap();
    wait_for_status(&mut rx, SessionStatus::Active).await;
    tx.unbounded_send(chunk(b"tail line\n")).unwrap();
    drop(tx);
    wait_for_status(&mut rx, SessionStatus::Ended).await;

    release.send(()).unwrap();
    assert_matches!(refresh.await, Err(LogTailError::AlreadyActive));
    assert_eq!(controller.export(), format!("tail line\n{ENDED_SENTINEL}"));
}

#[tokio::test]
async fn line_limit_is_clamped() {
    let controller = setup();
    assert_eq!(controller.line_limit(), 100);
    controller.set_line_limit(5000);
    assert_eq!(controller.line_limit(), 1000);
    controller.set_line_limit(0);
    assert_eq!(controller.line_limit(), 1);
}

#[tokio::test]
async fn dropping_controller_releases_stream() {
    let controller = setup();
    let source = controller.source();
    let tx = source.push_stream();
    let mut rx = controller.subscribe();

    controller.start().unwrap();
    wait_for_status(&mut rx, SessionStatus::Active).await;

    drop(controller);
    wait_for_status(&mut rx, SessionStatus::Stopped).await;
    settle().await;

    assert!(tx.is_closed());
}
