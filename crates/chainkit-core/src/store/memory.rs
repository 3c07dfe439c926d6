//! In-memory embedding store

use super::{
    check_segment_count, entry_id, rank, Candidate, Embedding, EmbeddingSearchRequest,
    EmbeddingSearchResult, EmbeddingStore, IdSequence,
};
use crate::error::{ChainkitError, Result};
use crate::metadata::{Filter, Metadata, TextSegment};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    id: String,
    embedding: Embedding,
    #[serde(default)]
    segment: Option<TextSegment>,
}

/// Embedding store kept entirely in memory, optionally snapshotted to JSON
#[derive(Default)]
pub struct InMemoryEmbeddingStore {
    entries: RwLock<Vec<Entry>>,
    sequence: IdSequence,
}

impl InMemoryEmbeddingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write all entries to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let entries = self.read()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string(&*entries)?;
        std::fs::write(path, json)?;
        tracing::debug!("Saved {} embeddings to {}", entries.len(), path.display());
        Ok(())
    }

    /// Load a store previously written with [`save`](Self::save)
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let entries: Vec<Entry> = serde_json::from_str(&json)?;
        tracing::debug!("Loaded {} embeddings from {}", entries.len(), path.display());
        Ok(Self {
            sequence: IdSequence::starting_at(entries.len() as u64),
            entries: RwLock::new(entries),
        })
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<Entry>>> {
        self.entries
            .read()
            .map_err(|_| ChainkitError::Other(anyhow::anyhow!("embedding store lock poisoned")))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<Entry>>> {
        self.entries
            .write()
            .map_err(|_| ChainkitError::Other(anyhow::anyhow!("embedding store lock poisoned")))
    }

    fn insert(&self, embedding: Embedding, segment: Option<TextSegment>) -> Result<String> {
        let id = entry_id(&embedding, segment.as_ref(), &self.sequence.next_salt());
        let mut entries = self.write()?;
        if entries.iter().any(|e| e.id == id) {
            return Err(ChainkitError::Other(anyhow::anyhow!(
                "generated id {} already exists",
                id
            )));
        }
        entries.push(Entry {
            id: id.clone(),
            embedding,
            segment,
        });
        Ok(id)
    }
}

#[async_trait]
impl EmbeddingStore for InMemoryEmbeddingStore {
    async fn add(&self, embedding: Embedding) -> Result<String> {
        self.insert(embedding, None)
    }

    async fn add_with_id(&self, id: &str, embedding: Embedding) -> Result<()> {
        let mut entries = self.write()?;
        entries.retain(|e| e.id != id);
        entries.push(Entry {
            id: id.to_string(),
            embedding,
            segment: None,
        });
        Ok(())
    }

    async fn add_segment(&self, embedding: Embedding, segment: TextSegment) -> Result<String> {
        self.insert(embedding, Some(segment))
    }

    async fn add_all(
        &self,
        embeddings: Vec<Embedding>,
        segments: Option<Vec<TextSegment>>,
    ) -> Result<Vec<String>> {
        check_segment_count(&embeddings, segments.as_ref())?;

        let mut segments = segments.map(|s| s.into_iter());
        let mut ids = Vec::with_capacity(embeddings.len());
        for embedding in embeddings {
            let segment = segments.as_mut().and_then(|s| s.next());
            ids.push(self.insert(embedding, segment)?);
        }
        Ok(ids)
    }

    async fn search(&self, request: &EmbeddingSearchRequest) -> Result<EmbeddingSearchResult> {
        let entries = self.read()?;
        let matches = rank(
            entries.iter().map(|e| Candidate {
                id: &e.id,
                embedding: &e.embedding,
                segment: e.segment.as_ref(),
            }),
            request,
        )?;
        Ok(EmbeddingSearchResult { matches })
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let mut entries = self.write()?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        Ok(entries.len() != before)
    }

    async fn remove_all_matching(&self, filter: &Filter) -> Result<usize> {
        let empty = Metadata::new();
        let mut entries = self.write()?;

        let mut keep = Vec::with_capacity(entries.len());
        for entry in entries.iter() {
            let metadata = entry.segment.as_ref().map(|s| &s.metadata).unwrap_or(&empty);
            keep.push(!filter.test(metadata)?);
        }

        let before = entries.len();
        let mut flags = keep.into_iter();
        entries.retain(|_| flags.next().unwrap_or(true));
        Ok(before - entries.len())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}
