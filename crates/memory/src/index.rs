//! In-memory vector index.
//!
//! Entries live in a `BTreeMap` keyed by chunk id behind one `RwLock`, so a
//! per-URL replacement is a single write-locked section and readers never see
//! half of it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use switchyard_core::error::IndexError;
use switchyard_core::index::{IndexEntry, ScoredChunk, VectorIndex};
use tokio::sync::RwLock;

use crate::vector::rank;

/// The entry set shared by the in-memory and file-backed indexes.
#[derive(Debug, Default, Clone)]
pub(crate) struct IndexState {
    entries: BTreeMap<String, IndexEntry>,
}

impl IndexState {
    pub(crate) fn from_entries(entries: Vec<IndexEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.chunk_id.clone(), e)).collect(),
        }
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn dimension(&self) -> Option<usize> {
        self.entries.values().next().map(|e| e.embedding.len())
    }

    /// Every new vector must match the dimension already in the index.
    fn check_dimension<'a>(
        &self,
        incoming: impl IntoIterator<Item = &'a IndexEntry>,
        ignoring_source: Option<&str>,
    ) -> Result<(), IndexError> {
        let expected = self
            .entries
            .values()
            .find(|e| Some(e.metadata.source_url.as_str()) != ignoring_source)
            .map(|e| e.embedding.len());

        let mut expected = expected;
        for entry in incoming {
            let actual = entry.embedding.len();
            match expected {
                Some(dim) if dim != actual => {
                    return Err(IndexError::DimensionMismatch { expected: dim, actual });
                }
                None => expected = Some(actual),
                _ => {}
            }
        }
        Ok(())
    }

    pub(crate) fn upsert(&mut self, entry: IndexEntry) -> Result<(), IndexError> {
        let replacing_only_itself = self.entries.len() == 1 && self.entries.contains_key(&entry.chunk_id);
        if !replacing_only_itself {
            self.check_dimension(std::iter::once(&entry), None)?;
        }
        self.entries.insert(entry.chunk_id.clone(), entry);
        Ok(())
    }

    pub(crate) fn delete_by_source(&mut self, source_url: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.metadata.source_url != source_url);
        before - self.entries.len()
    }

    pub(crate) fn replace_source(
        &mut self,
        source_url: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<usize, IndexError> {
        self.check_dimension(&entries, Some(source_url))?;
        let retired = self.delete_by_source(source_url);
        for entry in entries {
            self.entries.insert(entry.chunk_id.clone(), entry);
        }
        Ok(retired)
    }

    pub(crate) fn source_hash(&self, source_url: &str) -> Option<String> {
        self.entries
            .values()
            .find(|e| e.metadata.source_url == source_url)
            .map(|e| e.metadata.content_hash.clone())
    }

    pub(crate) fn sources(&self) -> Vec<String> {
        let urls: BTreeSet<&str> = self.entries.values().map(|e| e.metadata.source_url.as_str()).collect();
        urls.into_iter().map(str::to_string).collect()
    }

    pub(crate) fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        match self.dimension() {
            Some(dim) if dim != vector.len() => Err(IndexError::DimensionMismatch {
                expected: dim,
                actual: vector.len(),
            }),
            _ => Ok(rank(self.entries(), vector, k)),
        }
    }
}

/// A vector index that lives only as long as the process.
#[derive(Debug, Default, Clone)]
pub struct InMemoryVectorIndex {
    state: Arc<RwLock<IndexState>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn upsert(&self, entry: IndexEntry) -> Result<(), IndexError> {
        self.state.write().await.upsert(entry)
    }

    async fn delete_by_source(&self, source_url: &str) -> Result<usize, IndexError> {
        Ok(self.state.write().await.delete_by_source(source_url))
    }

    async fn replace_source(&self, source_url: &str, entries: Vec<IndexEntry>) -> Result<usize, IndexError> {
        self.state.write().await.replace_source(source_url, entries)
    }

    async fn source_hash(&self, source_url: &str) -> Result<Option<String>, IndexError> {
        Ok(self.state.read().await.source_hash(source_url))
    }

    async fn sources(&self) -> Result<Vec<String>, IndexError> {
        Ok(self.state.read().await.sources())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        self.state.read().await.query(vector, k)
    }

    async fn count(&self) -> Result<usize, IndexError> {
        Ok(self.state.read().await.len())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use switchyard_core::index::ChunkMetadata;

    pub(crate) fn entry(id: &str, url: &str, hash: &str, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk_id: id.into(),
            embedding,
            metadata: ChunkMetadata {
                source_url: url.into(),
                title: "Help".into(),
                text: format!("text of {id}"),
                content_hash: hash.into(),
                position: 0,
            },
        }
    }

    const FEES: &str = "https://help.example.com/fees";
    const PIX: &str = "https://help.example.com/pix";

    #[tokio::test]
    async fn upsert_query_and_count() {
        let index = InMemoryVectorIndex::new();
        index.upsert(entry("a", FEES, "h1", vec![1.0, 0.0])).await.unwrap();
        index.upsert(entry("b", PIX, "h2", vec![0.0, 1.0])).await.unwrap();

        assert_eq!(index.count().await.unwrap(), 2);
        let results = index.query(&[1.0, 0.1], 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.chunk_id, "a");
    }

    #[tokio::test]
    async fn replace_source_retires_old_chunks() {
        let index = InMemoryVectorIndex::new();
        index.upsert(entry("old-0", FEES, "h1", vec![1.0, 0.0])).await.unwrap();
        index.upsert(entry("old-1", FEES, "h1", vec![1.0, 0.0])).await.unwrap();
        index.upsert(entry("pix-0", PIX, "p1", vec![0.0, 1.0])).await.unwrap();

        let retired = index
            .replace_source(FEES, vec![entry("new-0", FEES, "h2", vec![0.9, 0.1])])
            .await
            .unwrap();

        assert_eq!(retired, 2);
        assert_eq!(index.count().await.unwrap(), 2);
        assert_eq!(index.source_hash(FEES).await.unwrap().as_deref(), Some("h2"));
        assert_eq!(index.source_hash(PIX).await.unwrap().as_deref(), Some("p1"));

        let ids: Vec<_> = index
            .query(&[1.0, 0.0], 10)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.chunk.chunk_id)
            .collect();
        assert!(!ids.iter().any(|id| id.starts_with("old")));
    }

    #[tokio::test]
    async fn delete_by_source_counts_removed() {
        let index = InMemoryVectorIndex::new();
        index.upsert(entry("a", FEES, "h", vec![1.0])).await.unwrap();
        index.upsert(entry("b", FEES, "h", vec![1.0])).await.unwrap();
        assert_eq!(index.delete_by_source(FEES).await.unwrap(), 2);
        assert_eq!(index.delete_by_source(FEES).await.unwrap(), 0);
        assert!(index.source_hash(FEES).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sources_are_listed_once_each() {
        let index = InMemoryVectorIndex::new();
        index.upsert(entry("a", PIX, "p", vec![1.0])).await.unwrap();
        index.upsert(entry("b", FEES, "h", vec![1.0])).await.unwrap();
        index.upsert(entry("c", FEES, "h", vec![1.0])).await.unwrap();

        let mut sources = index.sources().await.unwrap();
        sources.sort();
        let mut expected = vec![FEES.to_string(), PIX.to_string()];
        expected.sort();
        assert_eq!(sources, expected);
    }

    #[tokio::test]
    async fn dimension_mismatch_rejected() {
        let index = InMemoryVectorIndex::new();
        index.upsert(entry("a", FEES, "h", vec![1.0, 0.0])).await.unwrap();

        let err = index.upsert(entry("b", PIX, "h", vec![1.0, 0.0, 0.0])).await.unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { expected: 2, actual: 3 }));

        let err = index.query(&[1.0], 3).await.unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn replacing_the_only_source_may_change_dimension() {
        let index = InMemoryVectorIndex::new();
        index.upsert(entry("a", FEES, "h", vec![1.0, 0.0])).await.unwrap();
        index
            .replace_source(FEES, vec![entry("b", FEES, "h2", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
        assert_eq!(index.query(&[1.0, 0.0, 0.0], 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_index_returns_nothing() {
        let index = InMemoryVectorIndex::new();
        assert!(index.query(&[1.0, 0.0], 5).await.unwrap().is_empty());
    }
}
