//! Log sources: where the tail's bytes come from.
//!
//! [`LogSource`] is the seam between the controller and the network.
//! [`HttpLogSource`] talks to the inference backend with [`reqwest`]:
//! a chunked, never-ending `text/plain` body for the live tail, and a
//! bounded JSON endpoint for one-shot refreshes.

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;

use crate::error::LogTailError;

/// Path of the chunked streaming endpoint.
pub const STREAM_PATH: &str = "/api/spark-logs/stream";

/// Path of the bounded one-shot endpoint (takes `?lines=N`).
pub const RECENT_PATH: &str = "/api/spark-logs";

/// Raw body chunks in arrival order.
pub type ChunkStream = BoxStream<'static, Result<Bytes, LogTailError>>;

/// A provider of live and recent log text.
#[async_trait::async_trait]
pub trait LogSource: Send + Sync + 'static {
    /// Open the live stream. Resolves once the response headers arrive.
    async fn open_stream(&self) -> Result<ChunkStream, LogTailError>;

    /// Fetch the last `lines` lines in one bounded request.
    async fn fetch_recent(&self, lines: u32) -> Result<RecentLogs, LogTailError>;
}

/// Body of the one-shot endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecentLogs {
    pub success: bool,
    #[serde(default)]
    pub logs: String,
    /// Line count the server actually applied.
    #[serde(default)]
    pub lines: Option<u32>,
    /// Server-side fetch time, as sent.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// HTTP log source for one backend.
pub struct HttpLogSource {
    client: reqwest::Client,
    api_url: String,
}

impl HttpLogSource {
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8000`.
    ///
    /// No request timeout is set: a healthy tail may stay silent for hours.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn stream_url(&self) -> String {
        format!("{}{STREAM_PATH}", self.api_url)
    }

    pub fn recent_url(&self) -> String {
        format!("{}{RECENT_PATH}", self.api_url)
    }

    /// Return the response unchanged on 2xx, otherwise an
    /// [`LogTailError::HttpStatus`] carrying the body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, LogTailError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(LogTailError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl LogSource for HttpLogSource {
    async fn open_stream(&self) -> Result<ChunkStream, LogTailError> {
        let response = self.client.get(self.stream_url()).send().await?;
        let response = Self::ensure_success(response).await?;

        tracing::debug!(url = %self.stream_url(), "Log stream opened");

        Ok(response.bytes_stream().map_err(LogTailError::from).boxed())
    }

    async fn fetch_recent(&self, lines: u32) -> Result<RecentLogs, LogTailError> {
        let response = self
            .client
            .get(self.recent_url())
            .query(&[("lines", lines)])
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<RecentLogs>().await?)
    }
}
