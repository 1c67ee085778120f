//! Statistics feed message types and parser.
//!
//! The backend sends JSON text frames of the shape
//! `{"type": "<kind>", "data": {...}}`. Only `stats_update` is acted upon;
//! its `data` is forwarded as an opaque snapshot payload.

use serde::Deserialize;
use xrayops_core::CoreError;

/// Full statistics state pushed by the backend.
pub const MSG_TYPE_STATS_UPDATE: &str = "stats_update";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// All feed messages this client understands.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// Replace the current snapshot with this payload.
    StatsUpdate(serde_json::Value),
}

/// Why a text frame was discarded.
#[derive(Debug, thiserror::Error)]
pub enum FeedParseError {
    #[error("Malformed feed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unrecognized message type '{0}'")]
    UnknownType(String),

    #[error("Message '{0}' carries no payload")]
    MissingPayload(String),
}

impl From<FeedParseError> for CoreError {
    fn from(err: FeedParseError) -> Self {
        CoreError::DecodeFailure(err.to_string())
    }
}

/// Parse a feed text frame into a typed message.
///
/// Returns `Err` for malformed JSON, unknown `type` values and updates
/// without `data`. Callers should log and continue.
pub fn parse_message(text: &str) -> Result<FeedMessage, FeedParseError> {
    let envelope: Envelope = serde_json::from_str(text)?;

    match envelope.kind.as_str() {
        MSG_TYPE_STATS_UPDATE => match envelope.data {
            Some(data) if !data.is_null() => Ok(FeedMessage::StatsUpdate(data)),
            _ => Err(FeedParseError::MissingPayload(envelope.kind)),
        },
        _ => Err(FeedParseError::UnknownType(envelope.kind)),
    }
}
