//! Vector retriever: embed the query, nearest neighbours, threshold.

use std::sync::Arc;
use std::time::{Duration, Instant};

use switchyard_core::error::{EmbeddingError, Error};
use switchyard_core::index::{ScoredChunk, VectorIndex};
use switchyard_core::provider::Provider;
use switchyard_telemetry::{LogEntry, Stage, StructuredLogger};

const COMPONENT: &str = "retriever";
const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Retriever {
    provider: Arc<dyn Provider>,
    index: Arc<dyn VectorIndex>,
    embedding_model: String,
    min_similarity: f32,
    embed_timeout: Duration,
    logger: Arc<StructuredLogger>,
}

impl Retriever {
    pub fn new(
        provider: Arc<dyn Provider>,
        index: Arc<dyn VectorIndex>,
        embedding_model: impl Into<String>,
        min_similarity: f32,
        logger: Arc<StructuredLogger>,
    ) -> Self {
        Self {
            provider,
            index,
            embedding_model: embedding_model.into(),
            min_similarity,
            embed_timeout: DEFAULT_EMBED_TIMEOUT,
            logger,
        }
    }

    /// Bound on embedding the query text.
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    pub fn min_similarity(&self) -> f32 {
        self.min_similarity
    }

    /// Top `k` chunks with similarity at or above the threshold, best first.
    /// No passing chunk gives an empty list.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>, Error> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let started = Instant::now();

        let vector = self
            .provider
            .embed_one(&self.embedding_model, text, self.embed_timeout)
            .await
            .map_err(|source| EmbeddingError { attempts: 1, source })?;

        let candidates = self.index.query(&vector, k).await?;
        let considered = candidates.len();
        let results: Vec<ScoredChunk> = candidates
            .into_iter()
            .filter(|c| c.similarity >= self.min_similarity)
            .collect();

        let best = results.first().map(|c| c.similarity as f64);
        self.logger.log(
            LogEntry::info(Stage::Retrieval, COMPONENT, "Retrieval complete")
                .with_field("k", k)
                .with_field("considered", considered)
                .with_field("returned", results.len())
                .with_field("best_similarity", best)
                .with_duration(started.elapsed()),
        );
        Ok(results)
    }
}
