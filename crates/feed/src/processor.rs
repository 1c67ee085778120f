//! Socket frame processing loop.
//!
//! Reads frames from one feed socket, parses text frames into
//! [`FeedMessage`]s and hands snapshot updates to the owning session.
//! A bad message is logged and skipped; only the socket ending stops the
//! loop.

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use xrayops_core::CoreError;

use crate::client::{FeedFrame, FrameStream};
use crate::controller::FeedSession;
use crate::messages::{parse_message, FeedMessage};

/// How a socket's processing loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SocketOutcome {
    /// The socket closed or failed; carries the reason.
    Closed(String),
    /// The controller was torn down.
    Cancelled,
    /// The session no longer owns the controller.
    Superseded,
}

/// Process frames until the socket ends or the session is cancelled.
pub(crate) async fn process_frames(
    frames: &mut FrameStream,
    session: &FeedSession,
    cancel: &CancellationToken,
) -> SocketOutcome {
    let id = session.token().get();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return SocketOutcome::Cancelled,
            next = frames.next() => next,
        };

        match next {
            Some(Ok(FeedFrame::Text(text))) => {
                if !handle_text_message(&text, session) {
                    return SocketOutcome::Superseded;
                }
            }
            Some(Ok(FeedFrame::Binary(len))) => {
                tracing::trace!(session = id, len, "Ignoring binary feed frame");
            }
            Some(Ok(FeedFrame::Close(reason))) => {
                tracing::info!(session = id, ?reason, "Stats feed closed by server");
                let reason = reason
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| "closed by server".to_string());
                return SocketOutcome::Closed(reason);
            }
            Some(Err(e)) => {
                let reason = e.to_string();
                let error = CoreError::from(e);
                tracing::warn!(
                    session = id,
                    %error,
                    transient = error.is_transient(),
                    "Stats feed receive error",
                );
                return SocketOutcome::Closed(reason);
            }
            None => {
                tracing::info!(session = id, "Stats feed socket ended");
                return SocketOutcome::Closed("socket closed".to_string());
            }
        }
    }
}

/// Returns `false` when the session has been superseded.
fn handle_text_message(text: &str, session: &FeedSession) -> bool {
    match parse_message(text) {
        Ok(FeedMessage::StatsUpdate(data)) => session.apply_snapshot(data),
        Err(e) => {
            let error = CoreError::from(e);
            tracing::warn!(
                session = session.token().get(),
                %error,
                raw_message = %text,
                "Discarding feed message",
            );
            true
        }
    }
}
