//! Background ingestion: one run at a time, optional periodic refresh.

use std::sync::Arc;
use std::time::Duration;

use switchyard_core::error::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::builder::CorpusBuilder;
use crate::status::{IngestionReport, KnowledgeStatus};

/// Couples the corpus builder with the readiness signal it drives.
pub struct IngestionJob {
    builder: Arc<CorpusBuilder>,
    status: Arc<KnowledgeStatus>,
    running: Arc<Mutex<()>>,
}

impl IngestionJob {
    pub fn new(builder: Arc<CorpusBuilder>, status: Arc<KnowledgeStatus>) -> Self {
        Self {
            builder,
            status,
            running: Arc::new(Mutex::new(())),
        }
    }

    pub fn status(&self) -> &Arc<KnowledgeStatus> {
        &self.status
    }

    pub fn builder(&self) -> &Arc<CorpusBuilder> {
        &self.builder
    }

    /// Run one ingestion, waiting for any run already in progress.
    pub async fn run(&self) -> Result<IngestionReport, Error> {
        let _guard = self.running.lock().await;
        self.run_locked().await
    }

    /// Run one ingestion unless another is in progress (`None`).
    pub async fn try_run(&self) -> Option<Result<IngestionReport, Error>> {
        let _guard = self.running.try_lock().ok()?;
        Some(self.run_locked().await)
    }

    /// Claim the job and run it in the background, or `None` if a run is
    /// already in progress. The claim is taken before this returns.
    pub fn try_spawn(self: Arc<Self>) -> Option<JoinHandle<Result<IngestionReport, Error>>> {
        let guard = self.running.clone().try_lock_owned().ok()?;
        Some(tokio::spawn(async move {
            let result = self.run_locked().await;
            drop(guard);
            result
        }))
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    async fn run_locked(&self) -> Result<IngestionReport, Error> {
        self.status.begin_build();
        match self.builder.ingest().await {
            Ok(report) => {
                info!(
                    pages = report.pages_fetched,
                    written = report.chunks_written,
                    retired = report.chunks_retired,
                    "Knowledge base ready"
                );
                self.status.finish(report.clone());
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Knowledge ingestion failed");
                self.status.fail(e.to_string());
                Err(e)
            }
        }
    }

    /// Spawn the first run, then re-run every `refresh` if given.
    pub fn spawn(self: Arc<Self>, refresh: Option<Duration>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let _ = self.run().await;

            let Some(period) = refresh.filter(|p| !p.is_zero()) else {
                return;
            };
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                info!(period_secs = period.as_secs(), "Refreshing knowledge base");
                let _ = self.try_run().await;
            }
        })
    }
}
