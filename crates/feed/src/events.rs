//! Events emitted by the statistics feed.
//!
//! The dashboard subscribes to these to drive the connected/disconnected
//! indicator and to re-render charts when a new snapshot lands.

use std::sync::Arc;

use xrayops_core::snapshot::StatsSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// The socket opened.
    Connected,

    /// The socket closed or failed; a retry is scheduled.
    Disconnected {
        /// Human-readable cause.
        reason: String,
    },

    /// A new snapshot replaced the previous one.
    SnapshotUpdated(Arc<StatsSnapshot>),

    /// `disconnect()` was called. No further events follow.
    Terminated,
}
