//! Knowledge chunks and the vector index contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// A bounded slice of a scraped page, with its embedding. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub source_url: String,
    #[serde(default)]
    pub title: String,
    pub text: String,
    /// Hash of the whole page the chunk came from.
    pub content_hash: String,
    pub embedding: Vec<f32>,
    /// Zero-based position of the chunk within its page.
    pub position: usize,
}

/// Everything about a chunk except its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_url: String,
    #[serde(default)]
    pub title: String,
    pub text: String,
    pub content_hash: String,
    pub position: usize,
}

/// `chunk_id → (vector, metadata)` as stored inside an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk_id: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

impl From<Chunk> for IndexEntry {
    fn from(chunk: Chunk) -> Self {
        Self {
            chunk_id: chunk.chunk_id,
            embedding: chunk.embedding,
            metadata: ChunkMetadata {
                source_url: chunk.source_url,
                title: chunk.title,
                text: chunk.text,
                content_hash: chunk.content_hash,
                position: chunk.position,
            },
        }
    }
}

impl IndexEntry {
    pub fn to_chunk(&self) -> Chunk {
        Chunk {
            chunk_id: self.chunk_id.clone(),
            source_url: self.metadata.source_url.clone(),
            title: self.metadata.title.clone(),
            text: self.metadata.text.clone(),
            content_hash: self.metadata.content_hash.clone(),
            embedding: self.embedding.clone(),
            position: self.metadata.position,
        }
    }
}

/// A chunk returned by a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub similarity: f32,
}

/// The vector index contract.
///
/// `replace_source` must be atomic: concurrent queries observe either the
/// old chunk set for a URL or the new one, never a mix.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn name(&self) -> &str;

    /// Insert or overwrite one entry.
    async fn upsert(&self, entry: IndexEntry) -> Result<(), IndexError>;

    /// Remove every entry for a URL. Returns how many were removed.
    async fn delete_by_source(&self, source_url: &str) -> Result<usize, IndexError>;

    /// Swap the whole chunk set of a URL. Returns how many entries were retired.
    async fn replace_source(&self, source_url: &str, entries: Vec<IndexEntry>) -> Result<usize, IndexError>;

    /// The content hash currently indexed for a URL.
    async fn source_hash(&self, source_url: &str) -> Result<Option<String>, IndexError>;

    /// Every distinct source URL with at least one entry.
    async fn sources(&self) -> Result<Vec<String>, IndexError>;

    /// Top-`k` entries by cosine similarity, best first.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError>;

    /// Total number of entries.
    async fn count(&self) -> Result<usize, IndexError>;
}
