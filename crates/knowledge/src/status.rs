//! Knowledge base readiness, shared between the ingestion job and the
//! knowledge handler through a `watch` channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Lifecycle of the knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeState {
    /// Nothing ingested yet and no job running
    NotReady,
    /// First ingestion in progress
    Building,
    /// At least one ingestion finished; queries are served
    Ready,
    /// The first ingestion failed; nothing to serve
    Failed,
}

impl KnowledgeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeState::NotReady => "not_ready",
            KnowledgeState::Building => "building",
            KnowledgeState::Ready => "ready",
            KnowledgeState::Failed => "failed",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, KnowledgeState::Ready)
    }
}

impl std::fmt::Display for KnowledgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub pages_fetched: usize,
    pub pages_unchanged: usize,
    /// Fetched but too short to index
    pub pages_skipped: usize,
    pub pages_failed: usize,
    /// Indexed earlier but absent from this crawl, so dropped
    #[serde(default)]
    pub pages_removed: usize,
    pub chunks_written: usize,
    pub chunks_retired: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl IngestionReport {
    pub fn started() -> Self {
        let now = Utc::now();
        Self {
            pages_fetched: 0,
            pages_unchanged: 0,
            pages_skipped: 0,
            pages_failed: 0,
            pages_removed: 0,
            chunks_written: 0,
            chunks_retired: 0,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }
}

/// Point-in-time view of the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSnapshot {
    pub state: KnowledgeState,
    /// A refresh is running on top of a ready index
    pub refreshing: bool,
    pub last_report: Option<IngestionReport>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeSnapshot {
    fn new(state: KnowledgeState) -> Self {
        Self {
            state,
            refreshing: false,
            last_report: None,
            last_error: None,
            updated_at: Utc::now(),
        }
    }
}

/// Writer side of the readiness signal. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct KnowledgeStatus {
    tx: watch::Sender<KnowledgeSnapshot>,
}

impl Default for KnowledgeStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl KnowledgeStatus {
    pub fn new() -> Self {
        Self::with_state(KnowledgeState::NotReady)
    }

    /// Start already ready, e.g. when a persisted index was loaded.
    pub fn ready() -> Self {
        Self::with_state(KnowledgeState::Ready)
    }

    fn with_state(state: KnowledgeState) -> Self {
        let (tx, _rx) = watch::channel(KnowledgeSnapshot::new(state));
        Self { tx }
    }

    pub fn state(&self) -> KnowledgeState {
        self.tx.borrow().state
    }

    pub fn snapshot(&self) -> KnowledgeSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<KnowledgeSnapshot> {
        self.tx.subscribe()
    }

    /// An ingestion run started. A ready index stays ready while refreshing.
    pub fn begin_build(&self) {
        self.tx.send_modify(|s| {
            if s.state.is_ready() {
                s.refreshing = true;
            } else {
                s.state = KnowledgeState::Building;
            }
            s.updated_at = Utc::now();
        });
    }

    pub fn finish(&self, report: IngestionReport) {
        self.tx.send_modify(|s| {
            s.state = KnowledgeState::Ready;
            s.refreshing = false;
            s.last_report = Some(report);
            s.last_error = None;
            s.updated_at = Utc::now();
        });
    }

    /// An ingestion run failed. A previously ready index keeps serving.
    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.tx.send_modify(|s| {
            if !s.state.is_ready() {
                s.state = KnowledgeState::Failed;
            }
            s.refreshing = false;
            s.last_error = Some(reason);
            s.updated_at = Utc::now();
        });
    }

    /// Resolve once the state is `Ready` or `Failed`.
    pub async fn settled(&self) -> KnowledgeState {
        let mut rx = self.subscribe();
        loop {
            let state = rx.borrow_and_update().state;
            if matches!(state, KnowledgeState::Ready | KnowledgeState::Failed) {
                return state;
            }
            if rx.changed().await.is_err() {
                return self.state();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn first_build_goes_through_building() {
        let status = KnowledgeStatus::new();
        assert_eq!(status.state(), KnowledgeState::NotReady);
        status.begin_build();
        assert_eq!(status.state(), KnowledgeState::Building);
        status.finish(IngestionReport::started().finish());
        assert_eq!(status.state(), KnowledgeState::Ready);
        assert!(status.snapshot().last_report.is_some());
    }

    #[test]
    fn failed_first_build() {
        let status = KnowledgeStatus::new();
        status.begin_build();
        status.fail("embedding service down");
        let snap = status.snapshot();
        assert_eq!(snap.state, KnowledgeState::Failed);
        assert_eq!(snap.last_error.as_deref(), Some("embedding service down"));
    }

    #[test]
    fn refresh_keeps_serving() {
        let status = KnowledgeStatus::ready();
        status.begin_build();
        assert_eq!(status.state(), KnowledgeState::Ready);
        assert!(status.snapshot().refreshing);

        status.fail("network");
        let snap = status.snapshot();
        assert_eq!(snap.state, KnowledgeState::Ready);
        assert!(!snap.refreshing);
    }

    #[tokio::test]
    async fn settled_waits_for_outcome() {
        let status = Arc::new(KnowledgeStatus::new());
        status.begin_build();

        let writer = status.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            writer.finish(IngestionReport::started().finish());
        });

        assert_eq!(status.settled().await, KnowledgeState::Ready);
    }

    #[test]
    fn state_serializes_snake_case() {
        assert_eq!(serde_json::to_value(KnowledgeState::NotReady).unwrap(), "not_ready");
        assert_eq!(KnowledgeState::Building.to_string(), "building");
    }
}
