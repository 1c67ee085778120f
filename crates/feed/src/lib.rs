//! Live statistics feed over a persistent WebSocket.
//!
//! Provides message parsing, the socket transport, the fixed-delay
//! reconnection policy and the [`StatsFeedController`] that republishes the
//! latest [`StatsSnapshot`](xrayops_core::snapshot::StatsSnapshot) to the
//! dashboard.

pub mod client;
pub mod controller;
pub mod events;
pub mod messages;
mod processor;
pub mod reconnect;

pub use client::{FeedError, FeedFrame, FeedTransport, FrameStream, WsFeedClient};
pub use controller::StatsFeedController;
pub use events::FeedEvent;
pub use reconnect::{FeedState, ReconnectPolicy};
