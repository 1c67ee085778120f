//! Log tail startup for the console.

use xrayops_logtail::{LogSource, LogTailController, LogTailError};

/// Show the last `lines` lines, then switch to the live tail.
///
/// The backlog reaches subscribers as a regular append before the live
/// session clears the buffer. A failed backlog fetch is logged and the tail
/// starts anyway.
pub async fn start_with_backlog<S: LogSource>(
    tail: &LogTailController<S>,
    lines: u32,
) -> Result<(), LogTailError> {
    tail.set_line_limit(lines);

    match tail.refresh().await {
        Ok(bytes) => tracing::info!(lines = tail.line_limit(), bytes, "Loaded recent logs"),
        Err(e) => tracing::warn!(error = %e, "Could not load recent logs"),
    }

    let session = tail.start()?;
    tracing::info!(session = %session, "Live log tail requested");
    Ok(())
}
