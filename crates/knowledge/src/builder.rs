//! Corpus builder: crawl, extract, chunk, embed, index.
//!
//! The crawl is breadth-first from the configured root, bounded by page
//! count and link depth, and never leaves the root's host. A page that
//! cannot be fetched is logged and skipped. An embedding or index failure
//! aborts the run: a half-built corpus is worse than the previous one.
//!
//! After a crawl that reached the root, the index holds exactly the pages
//! fetched in that crawl: sources it did not fetch are dropped. A root that
//! cannot be fetched leaves the index as it was, and fails the run when
//! there is nothing indexed to fall back on.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use switchyard_config::KnowledgeConfig;
use switchyard_core::error::{Error, ScrapeError};
use switchyard_core::fetch::PageFetcher;
use switchyard_core::index::{Chunk, IndexEntry, VectorIndex};
use switchyard_core::provider::Provider;
use switchyard_telemetry::{LogEntry, Stage, StructuredLogger};
use tracing::{debug, info, warn};

use crate::chunker::{chunk_id, chunk_words, content_hash};
use crate::embed::{embed_with_backoff, BackoffPolicy};
use crate::extract::extract_page;
use crate::status::IngestionReport;

const COMPONENT: &str = "corpus_builder";

/// What indexing one page did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// Same content hash as the indexed version; nothing written.
    Unchanged,
    /// Chunk set written, replacing `retired` older chunks.
    Indexed { written: usize, retired: usize },
    /// Too little text to be worth indexing. Any chunks indexed for the
    /// page earlier are `retired`.
    TooShort { retired: usize },
}

pub struct CorpusBuilder {
    fetcher: Arc<dyn PageFetcher>,
    provider: Arc<dyn Provider>,
    index: Arc<dyn VectorIndex>,
    config: KnowledgeConfig,
    embedding_model: String,
    backoff: BackoffPolicy,
    logger: Arc<StructuredLogger>,
}

impl CorpusBuilder {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        provider: Arc<dyn Provider>,
        index: Arc<dyn VectorIndex>,
        config: &KnowledgeConfig,
        embedding_model: impl Into<String>,
        logger: Arc<StructuredLogger>,
    ) -> Self {
        Self {
            fetcher,
            provider,
            index,
            backoff: BackoffPolicy::from_config(config),
            config: config.clone(),
            embedding_model: embedding_model.into(),
            logger,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn root_url(&self) -> &str {
        &self.config.root_url
    }

    /// Crawl from the root and bring the index up to date.
    pub async fn ingest(&self) -> Result<IngestionReport, Error> {
        let started = Instant::now();
        let mut report = IngestionReport::started();

        let root = reqwest::Url::parse(&self.config.root_url)
            .map_err(|e| ScrapeError::InvalidUrl(format!("{}: {e}", self.config.root_url)))?;
        info!(root = %root, max_pages = self.config.max_pages, max_depth = self.config.max_depth, "Ingestion started");

        let root = root.to_string();
        let mut queue: VecDeque<(String, usize)> = VecDeque::from([(root.clone(), 0)]);
        let mut seen: HashSet<String> = HashSet::from([root.clone()]);
        let mut fetched: HashSet<String> = HashSet::new();
        let mut attempted = 0;

        while let Some((url, depth)) = queue.pop_front() {
            if attempted >= self.config.max_pages {
                break;
            }
            attempted += 1;

            let page = match self.fetcher.fetch(&url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(url = %url, error = %e, "Skipping page that could not be fetched");
                    self.logger.log(
                        LogEntry::warn(Stage::Ingestion, COMPONENT, "Page fetch failed")
                            .with_field("url", url.as_str())
                            .with_field("error", e.to_string()),
                    );
                    report.pages_failed += 1;
                    if url == root {
                        return self.root_unreachable(e, report, started).await;
                    }
                    continue;
                }
            };
            report.pages_fetched += 1;
            fetched.insert(url.clone());

            let extracted = extract_page(&url, &page.html);
            if depth < self.config.max_depth {
                for link in extracted.links {
                    if seen.insert(link.clone()) {
                        queue.push_back((link, depth + 1));
                    }
                }
            }

            let outcome = match self.index_page(&url, &extracted.title, &extracted.text).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.logger.log(
                        LogEntry::error(Stage::Ingestion, COMPONENT, "Ingestion aborted")
                            .with_field("url", url.as_str())
                            .with_field("error", e.to_string())
                            .with_duration(started.elapsed()),
                    );
                    return Err(e);
                }
            };

            match outcome {
                PageOutcome::Unchanged => report.pages_unchanged += 1,
                PageOutcome::TooShort { retired } => {
                    report.pages_skipped += 1;
                    report.chunks_retired += retired;
                }
                PageOutcome::Indexed { written, retired } => {
                    report.chunks_written += written;
                    report.chunks_retired += retired;
                }
            }
        }

        // ── Drop sources this crawl no longer reaches ──
        for source in self.index.sources().await? {
            if fetched.contains(&source) {
                continue;
            }
            let retired = self.index.delete_by_source(&source).await?;
            debug!(url = %source, retired, "Source no longer crawled, removed");
            report.pages_removed += 1;
            report.chunks_retired += retired;
        }

        let report = report.finish();
        self.logger.log(
            LogEntry::info(Stage::Ingestion, COMPONENT, "Ingestion finished")
                .with_field("pages_fetched", report.pages_fetched)
                .with_field("pages_unchanged", report.pages_unchanged)
                .with_field("pages_skipped", report.pages_skipped)
                .with_field("pages_failed", report.pages_failed)
                .with_field("pages_removed", report.pages_removed)
                .with_field("chunks_written", report.chunks_written)
                .with_field("chunks_retired", report.chunks_retired)
                .with_duration(started.elapsed()),
        );
        Ok(report)
    }

    /// The root could not be fetched: keep whatever is indexed, or fail when
    /// the index is empty.
    async fn root_unreachable(
        &self,
        cause: ScrapeError,
        report: IngestionReport,
        started: Instant,
    ) -> Result<IngestionReport, Error> {
        let indexed = self.index.count().await?;
        if indexed == 0 {
            self.logger.log(
                LogEntry::error(Stage::Ingestion, COMPONENT, "Ingestion failed: root unreachable")
                    .with_field("error", cause.to_string())
                    .with_duration(started.elapsed()),
            );
            return Err(cause.into());
        }

        warn!(indexed, error = %cause, "Root unreachable, keeping the existing index");
        self.logger.log(
            LogEntry::warn(Stage::Ingestion, COMPONENT, "Root unreachable, existing index kept")
                .with_field("chunks_indexed", indexed)
                .with_duration(started.elapsed()),
        );
        Ok(report.finish())
    }

    /// Index one page's extracted text.
    ///
    /// An unchanged content hash is a no-op. A page too short to index loses
    /// whatever it had indexed. Otherwise the page is chunked, embedded, and
    /// swapped in as a whole.
    pub async fn index_page(&self, url: &str, title: &str, text: &str) -> Result<PageOutcome, Error> {
        if text.chars().count() < self.config.min_page_chars {
            let retired = match self.index.source_hash(url).await? {
                Some(_) => self.index.delete_by_source(url).await?,
                None => 0,
            };
            debug!(url, chars = text.chars().count(), retired, "Page too short, skipped");
            return Ok(PageOutcome::TooShort { retired });
        }

        let hash = content_hash(text);
        if self.index.source_hash(url).await?.as_deref() == Some(hash.as_str()) {
            debug!(url, "Page unchanged");
            return Ok(PageOutcome::Unchanged);
        }

        let pieces = chunk_words(text, self.config.chunk_tokens, self.config.chunk_overlap);
        let vectors =
            embed_with_backoff(self.provider.as_ref(), &self.embedding_model, pieces.clone(), self.backoff).await?;

        let entries: Vec<IndexEntry> = pieces
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(position, (piece, embedding))| {
                IndexEntry::from(Chunk {
                    chunk_id: chunk_id(url, &hash, position),
                    source_url: url.to_string(),
                    title: title.to_string(),
                    text: piece,
                    content_hash: hash.clone(),
                    embedding,
                    position,
                })
            })
            .collect();

        let written = entries.len();
        let retired = self.index.replace_source(url, entries).await?;
        debug!(url, written, retired, "Page indexed");
        Ok(PageOutcome::Indexed { written, retired })
    }
}
