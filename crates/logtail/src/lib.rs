//! Live log tail over a chunked HTTP response.
//!
//! [`LogTailController`] opens the backend's streaming log endpoint, decodes
//! the body incrementally with a per-session [`Utf8StreamDecoder`], and
//! appends the text to a [`LogBuffer`] that the operator can clear or
//! export at any time. Lifecycle transitions are recorded in the buffer as
//! sentinel lines and broadcast as [`TailEvent`]s.

pub mod buffer;
pub mod controller;
pub mod decoder;
pub mod error;
pub mod export;
pub mod source;

pub use buffer::LogBuffer;
pub use controller::{LogTailController, TailEvent};
pub use decoder::Utf8StreamDecoder;
pub use error::LogTailError;
pub use export::ExportedLog;
pub use source::{ChunkStream, HttpLogSource, LogSource, RecentLogs};
