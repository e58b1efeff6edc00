//! Structured logging for Switchyard.
//!
//! Every pipeline stage (security, routing, handler, persistence,
//! response, ingestion, retrieval) reports a [`LogEntry`] to a shared
//! [`StructuredLogger`]. User and conversation identifiers are masked
//! before an entry is stored or forwarded.

pub mod logger;
pub mod mask;
pub mod model;

pub use logger::{LogSink, StructuredLogger, TracingSink};
pub use mask::{mask_conversation_id, mask_identifier, mask_user_id, preview};
pub use model::{Level, LogEntry, Stage};
