//! Knowledge corpus for Switchyard's retrieval-augmented agent.
//!
//! The [`CorpusBuilder`] crawls the help center, extracts readable text,
//! chunks and embeds it, and keeps the vector index in sync page by page.
//! The [`Retriever`] answers nearest-neighbour queries against that index.
//! [`IngestionJob`] runs the builder in the background and publishes
//! readiness through [`KnowledgeStatus`].

pub mod builder;
pub mod chunker;
pub mod embed;
pub mod extract;
pub mod fetch;
pub mod job;
pub mod retriever;
pub mod status;

pub use builder::{CorpusBuilder, PageOutcome};
pub use chunker::{chunk_id, chunk_words, content_hash};
pub use embed::{embed_with_backoff, BackoffPolicy};
pub use extract::{extract_page, ExtractedPage};
pub use fetch::{FixtureFetcher, HttpFetcher};
pub use job::IngestionJob;
pub use retriever::Retriever;
pub use status::{IngestionReport, KnowledgeSnapshot, KnowledgeState, KnowledgeStatus};
