//! File-backed vector index: the whole index as one JSON document.
//!
//! Entries are loaded on open and the file is rewritten after every
//! mutation: the new content goes to a sibling temp file which is then
//! renamed over the old one, so a crash mid-write never leaves a torn index.
//!
//! An unreadable file does not prevent startup. The index opens empty and
//! marked corrupt; queries fail with [`IndexError::Corrupt`] until the next
//! successful write rebuilds it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use switchyard_core::error::IndexError;
use switchyard_core::index::{IndexEntry, ScoredChunk, VectorIndex};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::index::IndexState;

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    entries: Vec<IndexEntry>,
}

struct FileState {
    index: IndexState,
    corrupt: Option<String>,
}

pub struct FileVectorIndex {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

impl FileVectorIndex {
    /// Open the index at `path`. A missing file starts empty.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match Self::load(&path).await {
            Ok(entries) => {
                debug!(path = %path.display(), count = entries.len(), "Vector index loaded");
                FileState {
                    index: IndexState::from_entries(entries),
                    corrupt: None,
                }
            }
            Err(reason) => {
                warn!(path = %path.display(), error = %reason, "Vector index unreadable; starting empty");
                FileState {
                    index: IndexState::default(),
                    corrupt: Some(reason),
                }
            }
        };

        Self {
            path,
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Default path: `~/.switchyard/index.json`
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".switchyard").join("index.json")
    }

    async fn load(path: &Path) -> Result<Vec<IndexEntry>, String> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(format!("read failed: {e}")),
        };

        let file: IndexFile =
            serde_json::from_str(&content).map_err(|e| format!("parse failed: {e}"))?;
        if file.version != FORMAT_VERSION {
            return Err(format!("unsupported index version {}", file.version));
        }
        Ok(file.entries)
    }

    /// Write `index` to disk via temp file + rename.
    async fn flush(&self, index: &IndexState) -> Result<(), IndexError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    IndexError::Storage(format!("Failed to create index directory: {e}"))
                })?;
            }
        }

        let file = IndexFile {
            version: FORMAT_VERSION,
            entries: index.entries().cloned().collect(),
        };
        let content = serde_json::to_vec(&file)
            .map_err(|e| IndexError::Storage(format!("Failed to serialize index: {e}")))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &content)
            .await
            .map_err(|e| IndexError::Storage(format!("Failed to write index: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| IndexError::Storage(format!("Failed to replace index: {e}")))?;
        Ok(())
    }

    /// Apply `change` to a copy of the index, persist it, then publish it.
    async fn mutate<T>(
        &self,
        change: impl FnOnce(&mut IndexState) -> Result<T, IndexError>,
    ) -> Result<T, IndexError> {
        let mut state = self.state.write().await;
        let mut next = state.index.clone();
        let out = change(&mut next)?;
        self.flush(&next).await?;
        state.index = next;
        state.corrupt = None;
        Ok(out)
    }
}

#[async_trait]
impl VectorIndex for FileVectorIndex {
    fn name(&self) -> &str {
        "file"
    }

    async fn upsert(&self, entry: IndexEntry) -> Result<(), IndexError> {
        self.mutate(|index| index.upsert(entry)).await
    }

    async fn delete_by_source(&self, source_url: &str) -> Result<usize, IndexError> {
        self.mutate(|index| Ok(index.delete_by_source(source_url))).await
    }

    async fn replace_source(&self, source_url: &str, entries: Vec<IndexEntry>) -> Result<usize, IndexError> {
        self.mutate(|index| index.replace_source(source_url, entries)).await
    }

    async fn source_hash(&self, source_url: &str) -> Result<Option<String>, IndexError> {
        Ok(self.state.read().await.index.source_hash(source_url))
    }

    async fn sources(&self) -> Result<Vec<String>, IndexError> {
        Ok(self.state.read().await.index.sources())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        let state = self.state.read().await;
        if let Some(reason) = &state.corrupt {
            return Err(IndexError::Corrupt(format!("{}: {reason}", self.path.display())));
        }
        state.index.query(vector, k)
    }

    async fn count(&self) -> Result<usize, IndexError> {
        Ok(self.state.read().await.index.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::entry;
    use tempfile::TempDir;

    const FEES: &str = "https://help.example.com/fees";

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");

        let index = FileVectorIndex::open(&path).await;
        index.upsert(entry("a", FEES, "h1", vec![1.0, 0.0])).await.unwrap();
        index.upsert(entry("b", FEES, "h1", vec![0.0, 1.0])).await.unwrap();

        let reopened = FileVectorIndex::open(&path).await;
        assert_eq!(reopened.count().await.unwrap(), 2);
        assert_eq!(reopened.source_hash(FEES).await.unwrap().as_deref(), Some("h1"));
        let top = reopened.query(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(top[0].chunk.chunk_id, "a");
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let index = FileVectorIndex::open(dir.path().join("nested").join("index.json")).await;
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.query(&[1.0], 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn writes_leave_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let index = FileVectorIndex::open(&path).await;
        index
            .replace_source(FEES, vec![entry("a", FEES, "h", vec![1.0])])
            .await
            .unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("index.json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_fails_queries_until_rebuilt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, "{ not json").unwrap();

        let index = FileVectorIndex::open(&path).await;
        let err = index.query(&[1.0], 3).await.unwrap_err();
        assert!(matches!(err, IndexError::Corrupt(_)));

        index
            .replace_source(FEES, vec![entry("a", FEES, "h", vec![1.0])])
            .await
            .unwrap();
        assert_eq!(index.query(&[1.0], 3).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejected_write_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let index = FileVectorIndex::open(&path).await;
        index.upsert(entry("a", FEES, "h", vec![1.0, 0.0])).await.unwrap();

        let other = "https://help.example.com/pix";
        assert!(index
            .replace_source(other, vec![entry("b", other, "p", vec![1.0])])
            .await
            .is_err());

        let reopened = FileVectorIndex::open(&path).await;
        assert_eq!(reopened.count().await.unwrap(), 1);
    }
}
