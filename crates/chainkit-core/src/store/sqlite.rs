//! SQLite-backed embedding store
//!
//! Stores embeddings as little-endian f32 BLOBs next to the segment text and
//! its metadata JSON. Similarity and filtering run in Rust over all rows.

use super::{
    check_segment_count, entry_id, rank, Candidate, Embedding, EmbeddingSearchRequest,
    EmbeddingSearchResult, EmbeddingStore, IdSequence,
};
use crate::error::{ChainkitError, Result};
use crate::metadata::{Filter, Metadata, TextSegment};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS embeddings (
    id TEXT PRIMARY KEY,
    embedding BLOB NOT NULL,
    dimension INTEGER NOT NULL,
    text TEXT,
    metadata TEXT,
    created_at TEXT NOT NULL
);
"#;

/// Embedding store persisted in a SQLite database
pub struct SqliteEmbeddingStore {
    conn: Mutex<Connection>,
    sequence: IdSequence,
}

impl SqliteEmbeddingStore {
    /// Open (or create) a store at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    /// Default store location
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::DATA_DIR_NAME)
            .join("embeddings.sqlite")
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(CREATE_TABLES)?;
        let last_rowid: i64 =
            conn.query_row("SELECT IFNULL(MAX(rowid), 0) FROM embeddings", [], |row| row.get(0))?;
        Ok(Self {
            conn: Mutex::new(conn),
            sequence: IdSequence::starting_at(last_rowid as u64),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ChainkitError::Other(anyhow::anyhow!("sqlite connection lock poisoned")))
    }

    /// Insert a row. Generated ids use a plain INSERT so a clash fails
    /// instead of overwriting; `replace` is only set for caller-chosen ids.
    fn insert(
        conn: &Connection,
        id: &str,
        embedding: &Embedding,
        segment: Option<&TextSegment>,
        replace: bool,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let metadata_json = match segment {
            Some(s) => Some(s.metadata.to_json()?),
            None => None,
        };
        let verb = if replace { "INSERT OR REPLACE" } else { "INSERT" };
        conn.execute(
            &format!(
                "{} INTO embeddings (id, embedding, dimension, text, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                verb
            ),
            params![
                id,
                embedding_to_bytes(&embedding.vector),
                embedding.dimension() as i64,
                segment.map(|s| s.text.as_str()),
                metadata_json,
                now
            ],
        )?;
        Ok(())
    }

    fn next_id(&self, embedding: &Embedding, segment: Option<&TextSegment>) -> String {
        entry_id(embedding, segment, &self.sequence.next_salt())
    }

    fn load_all(conn: &Connection) -> Result<Vec<StoredRow>> {
        let mut stmt = conn.prepare("SELECT id, embedding, text, metadata FROM embeddings")?;
        let rows = stmt
            .query_map([], |row| {
                let bytes: Vec<u8> = row.get(1)?;
                Ok(RawRow {
                    id: row.get(0)?,
                    embedding: Embedding::new(bytes_to_embedding(&bytes)),
                    text: row.get(2)?,
                    metadata: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(StoredRow::try_from).collect()
    }
}

struct RawRow {
    id: String,
    embedding: Embedding,
    text: Option<String>,
    metadata: Option<String>,
}

struct StoredRow {
    id: String,
    embedding: Embedding,
    segment: Option<TextSegment>,
}

impl TryFrom<RawRow> for StoredRow {
    type Error = ChainkitError;

    fn try_from(raw: RawRow) -> Result<Self> {
        let segment = match raw.text {
            Some(text) => {
                let metadata = match raw.metadata {
                    Some(json) => Metadata::from_json(&json)?,
                    None => Metadata::new(),
                };
                Some(TextSegment::with_metadata(text, metadata))
            }
            None => None,
        };
        Ok(StoredRow {
            id: raw.id,
            embedding: raw.embedding,
            segment,
        })
    }
}

#[async_trait]
impl EmbeddingStore for SqliteEmbeddingStore {
    async fn add(&self, embedding: Embedding) -> Result<String> {
        let id = self.next_id(&embedding, None);
        Self::insert(&*self.conn()?, &id, &embedding, None, false)?;
        Ok(id)
    }

    async fn add_with_id(&self, id: &str, embedding: Embedding) -> Result<()> {
        Self::insert(&*self.conn()?, id, &embedding, None, true)
    }

    async fn add_segment(&self, embedding: Embedding, segment: TextSegment) -> Result<String> {
        let id = self.next_id(&embedding, Some(&segment));
        Self::insert(&*self.conn()?, &id, &embedding, Some(&segment), false)?;
        Ok(id)
    }

    async fn add_all(
        &self,
        embeddings: Vec<Embedding>,
        segments: Option<Vec<TextSegment>>,
    ) -> Result<Vec<String>> {
        check_segment_count(&embeddings, segments.as_ref())?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(embeddings.len());
        for (i, embedding) in embeddings.iter().enumerate() {
            let segment = segments.as_ref().map(|s| &s[i]);
            let id = self.next_id(embedding, segment);
            Self::insert(&tx, &id, embedding, segment, false)?;
            ids.push(id);
        }
        tx.commit()?;

        tracing::debug!("Inserted {} embeddings", ids.len());
        Ok(ids)
    }

    async fn search(&self, request: &EmbeddingSearchRequest) -> Result<EmbeddingSearchResult> {
        let rows = Self::load_all(&*self.conn()?)?;
        let matches = rank(
            rows.iter().map(|r| Candidate {
                id: &r.id,
                embedding: &r.embedding,
                segment: r.segment.as_ref(),
            }),
            request,
        )?;
        Ok(EmbeddingSearchResult { matches })
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()?
            .execute("DELETE FROM embeddings WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    async fn remove_all_matching(&self, filter: &Filter) -> Result<usize> {
        let mut conn = self.conn()?;
        let empty = Metadata::new();

        let mut doomed = Vec::new();
        for row in Self::load_all(&conn)? {
            let metadata = row.segment.as_ref().map(|s| &s.metadata).unwrap_or(&empty);
            if filter.test(metadata)? {
                doomed.push(row.id);
            }
        }

        let tx = conn.transaction()?;
        for id in &doomed {
            tx.execute("DELETE FROM embeddings WHERE id = ?1", params![id])?;
        }
        tx.commit()?;

        Ok(doomed.len())
    }

    async fn len(&self) -> Result<usize> {
        let count: i64 =
            self.conn()?
                .query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Convert f32 embedding to bytes (little-endian)
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert bytes to f32 embedding
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::key;
    use tempfile::TempDir;

    #[test]
    fn test_embedding_bytes() {
        let original = vec![1.0f32, 2.0, 3.0, -1.5];
        let restored = bytes_to_embedding(&embedding_to_bytes(&original));
        assert_eq!(original, restored);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.sqlite");

        {
            let store = SqliteEmbeddingStore::open(&path).unwrap();
            store
                .add_segment(
                    Embedding::new(vec![1.0, 0.0]),
                    TextSegment::with_metadata(
                        "persisted",
                        Metadata::new().put("year", 2024).put("id", 1i64),
                    ),
                )
                .await
                .unwrap();
        }

        let store = SqliteEmbeddingStore::open(&path).unwrap();
        assert_eq!(store.len().await.unwrap(), 1);

        let request = EmbeddingSearchRequest::builder(vec![1.0, 0.0])
            .filter(key("year").gte(2024).and(key("id").eq(1)))
            .build()
            .unwrap();
        let result = store.search(&request).await.unwrap();
        assert_eq!(result.matches.len(), 1);

        let segment = result.matches[0].embedded.as_ref().unwrap();
        assert_eq!(segment.text, "persisted");
        assert_eq!(
            segment.metadata.get("id"),
            Some(&crate::metadata::MetadataValue::Long(1))
        );
    }

    #[tokio::test]
    async fn test_remove_and_remove_matching() {
        let store = SqliteEmbeddingStore::open_in_memory().unwrap();
        let ids = store
            .add_all(
                vec![Embedding::new(vec![1.0]), Embedding::new(vec![1.0])],
                Some(vec![
                    TextSegment::with_metadata("a", Metadata::new().put("tier", "free")),
                    TextSegment::with_metadata("b", Metadata::new().put("tier", "paid")),
                ]),
            )
            .await
            .unwrap();
        store.add(Embedding::new(vec![1.0])).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 3);

        assert!(store.remove(&ids[0]).await.unwrap());
        assert!(!store.remove("missing").await.unwrap());

        // entry without a segment has no "tier", so `ne` matches it
        let removed = store
            .remove_all_matching(&key("tier").ne("paid"))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_add_after_remove_and_reopen_keeps_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.sqlite");
        let vector = || Embedding::new(vec![1.0, 0.0]);

        {
            let store = SqliteEmbeddingStore::open(&path).unwrap();
            let a = store
                .add_segment(vector(), TextSegment::new("a"))
                .await
                .unwrap();
            store
                .add_segment(
                    vector(),
                    TextSegment::with_metadata("b", Metadata::new().put("v", 1)),
                )
                .await
                .unwrap();
            assert!(store.remove(&a).await.unwrap());
        }

        let store = SqliteEmbeddingStore::open(&path).unwrap();
        store
            .add_segment(
                vector(),
                TextSegment::with_metadata("b", Metadata::new().put("v", 2)),
            )
            .await
            .unwrap();
        assert_eq!(store.len().await.unwrap(), 2);

        let request = EmbeddingSearchRequest::builder(vec![1.0, 0.0])
            .max_results(10)
            .build()
            .unwrap();
        let mut versions: Vec<_> = store
            .search(&request)
            .await
            .unwrap()
            .matches
            .iter()
            .filter_map(|m| m.embedded.as_ref()?.metadata.get("v").cloned())
            .collect();
        versions.sort_by_key(|v| v.to_string());
        assert_eq!(
            versions,
            vec![
                crate::metadata::MetadataValue::Integer(1),
                crate::metadata::MetadataValue::Integer(2)
            ]
        );
    }

    #[tokio::test]
    async fn test_add_with_id_replaces() {
        let store = SqliteEmbeddingStore::open_in_memory().unwrap();
        store
            .add_with_id("fixed", Embedding::new(vec![1.0]))
            .await
            .unwrap();
        store
            .add_with_id("fixed", Embedding::new(vec![-1.0]))
            .await
            .unwrap();
        assert_eq!(store.len().await.unwrap(), 1);
    }
}
