//! Shared building blocks for the x-ray operations dashboard delivery layer.
//!
//! This crate has no I/O. It holds the pieces that both streaming
//! controllers (log tail and statistics feed) agree on, plus the pure
//! prediction filter that the dashboard tables run over their data:
//!
//! - [`error::CoreError`]: the delivery-layer error taxonomy.
//! - [`session`]: session status values and the generation guard that
//!   decides whether an in-flight callback still belongs to the live session.
//! - [`snapshot`]: the immutable statistics snapshot and connection health.
//! - [`filter`]: the prediction filter engine.

pub mod error;
pub mod filter;
pub mod session;
pub mod snapshot;
pub mod types;

pub use error::CoreError;
