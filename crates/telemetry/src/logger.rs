//! The structured logger: every pipeline stage reports here.
//!
//! Entries are kept in a bounded in-memory buffer (for inspection and
//! tests) and forwarded to each configured sink.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::model::{Level, LogEntry, Stage};

/// Where log entries are written.
pub trait LogSink: Send + Sync {
    fn record(&self, entry: &LogEntry);
}

pub struct StructuredLogger {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    sinks: Vec<Box<dyn LogSink>>,
}

impl std::fmt::Debug for StructuredLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredLogger")
            .field("entry_count", &self.count())
            .field("capacity", &self.capacity)
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::new(1_000)
    }
}

impl StructuredLogger {
    /// A logger with no sinks that retains up to `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1_024))),
            capacity,
            sinks: Vec::new(),
        }
    }

    /// A logger that forwards every entry to `tracing`.
    pub fn with_tracing(capacity: usize) -> Self {
        Self::new(capacity).with_sink(Box::new(TracingSink))
    }

    pub fn with_sink(mut self, sink: Box<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn log(&self, entry: LogEntry) {
        for sink in &self.sinks {
            sink.record(&entry);
        }

        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// All retained entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn entries_for_stage(&self, stage: Stage) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| e.stage == stage)
            .cloned()
            .collect()
    }

    /// Retained entries tagged with `request_id`, oldest first.
    pub fn entries_for_request(&self, request_id: &str) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| e.request_id.as_deref() == Some(request_id))
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// Forwards entries to `tracing` at the matching level.
pub struct TracingSink;

impl LogSink for TracingSink {
    fn record(&self, entry: &LogEntry) {
        let request_id = entry.request_id.as_deref().unwrap_or("-");
        let user = entry.user_id.as_deref().unwrap_or("-");
        let conversation = entry.conversation_id.as_deref().unwrap_or("-");
        let fields = entry.fields_json();

        macro_rules! emit {
            ($mac:ident) => {
                tracing::$mac!(
                    stage = %entry.stage,
                    component = %entry.component,
                    request_id = %request_id,
                    user = %user,
                    conversation = %conversation,
                    duration_ms = ?entry.duration_ms,
                    fields = %fields,
                    "{}",
                    entry.message
                )
            };
        }

        match entry.level {
            Level::Debug => emit!(debug),
            Level::Info => emit!(info),
            Level::Warn => emit!(warn),
            Level::Error => emit!(error),
        }
    }
}
