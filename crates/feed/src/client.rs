//! Socket transport for the statistics feed.
//!
//! [`FeedTransport`] is the seam between the controller and the network:
//! each `connect()` yields one socket's inbound frames as a stream.
//! [`WsFeedClient`] implements it over `tokio-tungstenite`.

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use xrayops_core::CoreError;

/// Path of the statistics WebSocket endpoint.
pub const STATS_WS_PATH: &str = "/api/ws/stats";

/// An inbound frame, reduced to what the feed cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFrame {
    /// A JSON text message.
    Text(String),
    /// A binary frame (ignored by the feed); carries its length.
    Binary(usize),
    /// The server sent a close frame, optionally with a reason.
    Close(Option<String>),
}

/// One socket's frames in arrival order. Ends when the socket drops.
pub type FrameStream = BoxStream<'static, Result<FeedFrame, FeedError>>;

/// A way to open the statistics socket.
#[async_trait::async_trait]
pub trait FeedTransport: Send + Sync + 'static {
    async fn connect(&self) -> Result<FrameStream, FeedError>;
}

/// WebSocket transport for one backend.
pub struct WsFeedClient {
    ws_url: String,
}

impl WsFeedClient {
    /// * `ws_url` - WebSocket base URL, e.g. `ws://host:8000`.
    pub fn new(ws_url: impl Into<String>) -> Self {
        let ws_url = ws_url.into().trim_end_matches('/').to_string();
        Self { ws_url }
    }

    /// WebSocket base URL (e.g. `ws://host:8000`).
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Full URL of the statistics endpoint.
    pub fn stats_url(&self) -> String {
        format!("{}{STATS_WS_PATH}", self.ws_url)
    }
}

#[async_trait::async_trait]
impl FeedTransport for WsFeedClient {
    async fn connect(&self) -> Result<FrameStream, FeedError> {
        let url = self.stats_url();

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            FeedError::Connection(format!("Failed to connect to stats feed at {url}: {e}"))
        })?;

        tracing::info!(url = %url, "Connected to stats feed");

        // Pings are answered by tungstenite while the stream is polled.
        let frames = ws_stream.filter_map(|msg| async move {
            match msg {
                Ok(Message::Text(text)) => Some(Ok(FeedFrame::Text(text.to_string()))),
                Ok(Message::Binary(data)) => Some(Ok(FeedFrame::Binary(data.len()))),
                Ok(Message::Close(frame)) => {
                    Some(Ok(FeedFrame::Close(frame.map(|f| f.reason.to_string()))))
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
                Err(e) => Some(Err(FeedError::Protocol(e.to_string()))),
            }
        });

        Ok(frames.boxed())
    }
}

/// Errors from the statistics feed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// Failed to establish the socket.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an established socket.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The controller was torn down and cannot reconnect.
    #[error("Feed controller has been disconnected")]
    Terminated,
}

impl From<FeedError> for CoreError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::Connection(reason) | FeedError::Protocol(reason) => {
                CoreError::ConnectionFailure(reason)
            }
            FeedError::Terminated => CoreError::Validation(FeedError::Terminated.to_string()),
        }
    }
}
