//! Fixed-delay reconnection for the statistics feed.
//!
//! Every socket failure schedules exactly one new attempt after
//! [`ReconnectPolicy::delay`], forever, until the controller is torn down.
//! There is no backoff and no retry cap: a stale dashboard is acceptable,
//! a silently dead one is not.
//!
//! The loop's position is the explicit [`FeedState`]:
//!
//! ```text
//! Disconnected -> Connecting -> Connected
//! Connecting | Connected -> PendingRetry -> Connecting -> ...
//! any -> Terminated   (disconnect)
//! ```

use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Default delay between a socket failure and the next attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Tunable parameters for reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Wait before every reconnection attempt.
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl ReconnectPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    /// Sleep for the retry delay. Returns `false` if `cancel` fired first,
    /// in which case no attempt must follow.
    pub async fn wait(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.delay) => true,
        }
    }
}

/// Connection state of a feed controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FeedState {
    /// Never connected.
    Disconnected,
    /// A socket is being opened.
    Connecting,
    /// A socket is open.
    Connected,
    /// The last socket failed; one retry is scheduled.
    PendingRetry {
        /// Consecutive failed sockets since the last successful open.
        attempt: u32,
    },
    /// Torn down by `disconnect()`. Final.
    Terminated,
}

impl FeedState {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether a connection loop is running for this state.
    pub fn is_running(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Connected | Self::PendingRetry { .. }
        )
    }
}
