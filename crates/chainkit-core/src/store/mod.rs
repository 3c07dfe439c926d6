//! Embedding stores
//!
//! Stores hold embeddings (optionally with the text segment they were computed
//! from) and answer nearest-neighbour queries with an optional metadata filter.
//! Similarity is computed in Rust by brute force; relevance scores are cosine
//! similarity mapped into `[0, 1]`.

mod memory;
mod sqlite;

pub use memory::InMemoryEmbeddingStore;
pub use sqlite::SqliteEmbeddingStore;

use crate::error::{ChainkitError, Result};
use crate::metadata::{Filter, Metadata, TextSegment};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of matches returned by a search
pub const DEFAULT_MAX_RESULTS: usize = 3;

/// Dense vector representation of a piece of content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }

    /// Scale to unit length. Zero vectors are left untouched.
    pub fn normalize(&mut self) {
        let norm = self.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut self.vector {
                *x /= norm;
            }
        }
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(vector: Vec<f32>) -> Self {
        Self::new(vector)
    }
}

/// Compute cosine similarity between two embeddings
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Map cosine similarity from `[-1, 1]` into a relevance score in `[0, 1]`
pub fn relevance_score(cosine: f32) -> f64 {
    ((cosine as f64 + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Search criteria for [`EmbeddingStore::search`]
#[derive(Debug, Clone)]
pub struct EmbeddingSearchRequest {
    query_embedding: Embedding,
    max_results: usize,
    min_score: f64,
    filter: Option<Filter>,
}

impl EmbeddingSearchRequest {
    /// Start a request around the mandatory query embedding
    pub fn builder(query_embedding: impl Into<Embedding>) -> EmbeddingSearchRequestBuilder {
        EmbeddingSearchRequestBuilder {
            query_embedding: query_embedding.into(),
            max_results: None,
            min_score: None,
            filter: None,
        }
    }

    pub fn query_embedding(&self) -> &Embedding {
        &self.query_embedding
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub fn min_score(&self) -> f64 {
        self.min_score
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }
}

/// Builder for [`EmbeddingSearchRequest`]
#[derive(Debug, Clone)]
pub struct EmbeddingSearchRequestBuilder {
    query_embedding: Embedding,
    max_results: Option<usize>,
    min_score: Option<f64>,
    filter: Option<Filter>,
}

impl EmbeddingSearchRequestBuilder {
    /// Maximum number of matches (default 3, must be positive)
    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Minimum relevance score, inclusive, within `[0, 1]` (default 0)
    pub fn min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    /// Only segments whose metadata passes the filter are returned
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn build(self) -> Result<EmbeddingSearchRequest> {
        let max_results = self.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
        if max_results == 0 {
            return Err(ChainkitError::InvalidInput(
                "maxResults must be greater than zero".to_string(),
            ));
        }

        let min_score = self.min_score.unwrap_or(0.0);
        if !(0.0..=1.0).contains(&min_score) {
            return Err(ChainkitError::InvalidInput(format!(
                "minScore must be between 0.0 and 1.0, but is: {}",
                min_score
            )));
        }

        Ok(EmbeddingSearchRequest {
            query_embedding: self.query_embedding,
            max_results,
            min_score,
            filter: self.filter,
        })
    }
}

/// One search hit
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingMatch {
    pub id: String,
    pub score: f64,
    pub embedding: Embedding,
    pub embedded: Option<TextSegment>,
}

/// Search hits ordered by descending score
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmbeddingSearchResult {
    pub matches: Vec<EmbeddingMatch>,
}

/// Stored entry as seen by the shared ranking code
pub(crate) struct Candidate<'a> {
    pub id: &'a str,
    pub embedding: &'a Embedding,
    pub segment: Option<&'a TextSegment>,
}

/// Rank candidates against a request: filter, score, threshold, sort, truncate
pub(crate) fn rank<'a, I>(candidates: I, request: &EmbeddingSearchRequest) -> Result<Vec<EmbeddingMatch>>
where
    I: IntoIterator<Item = Candidate<'a>>,
{
    let empty = Metadata::new();
    let query = &request.query_embedding.vector;
    let mut matches = Vec::new();

    for candidate in candidates {
        if candidate.embedding.dimension() != query.len() {
            return Err(ChainkitError::InvalidInput(format!(
                "query embedding has {} dimensions but entry {} has {}",
                query.len(),
                candidate.id,
                candidate.embedding.dimension()
            )));
        }

        if let Some(filter) = &request.filter {
            let metadata = candidate.segment.map(|s| &s.metadata).unwrap_or(&empty);
            if !filter.test(metadata)? {
                continue;
            }
        }

        let score = relevance_score(cosine_similarity(query, &candidate.embedding.vector));
        if score < request.min_score {
            continue;
        }

        matches.push(EmbeddingMatch {
            id: candidate.id.to_string(),
            score,
            embedding: candidate.embedding.clone(),
            embedded: candidate.segment.cloned(),
        });
    }

    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(request.max_results);

    Ok(matches)
}

/// Content-derived id for an entry
pub(crate) fn entry_id(embedding: &Embedding, segment: Option<&TextSegment>, salt: &[u8]) -> String {
    let mut hasher = blake3::Hasher::new();
    for x in &embedding.vector {
        hasher.update(&x.to_le_bytes());
    }
    if let Some(segment) = segment {
        hasher.update(segment.text.as_bytes());
    }
    hasher.update(salt);
    hasher.finalize().to_hex()[..16].to_string()
}

/// Salts for generated ids
///
/// Each store instance draws a fresh epoch when it is opened, so salts never
/// repeat across reopens even after entries were removed.
pub(crate) struct IdSequence {
    epoch: i64,
    counter: AtomicU64,
}

impl IdSequence {
    pub fn starting_at(counter: u64) -> Self {
        let now = chrono::Utc::now();
        Self {
            epoch: now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_micros()),
            counter: AtomicU64::new(counter),
        }
    }

    pub fn next_salt(&self) -> [u8; 16] {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut salt = [0u8; 16];
        salt[..8].copy_from_slice(&self.epoch.to_le_bytes());
        salt[8..].copy_from_slice(&n.to_le_bytes());
        salt
    }
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::starting_at(0)
    }
}

/// Storage of embeddings with similarity search
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Add an embedding with a generated id
    async fn add(&self, embedding: Embedding) -> Result<String>;

    /// Add an embedding under a caller-provided id, replacing any previous entry
    async fn add_with_id(&self, id: &str, embedding: Embedding) -> Result<()>;

    /// Add an embedding together with the segment it was computed from
    async fn add_segment(&self, embedding: Embedding, segment: TextSegment) -> Result<String>;

    /// Add many embeddings, with segments when given (must then be the same length)
    async fn add_all(
        &self,
        embeddings: Vec<Embedding>,
        segments: Option<Vec<TextSegment>>,
    ) -> Result<Vec<String>>;

    /// Find the closest entries
    async fn search(&self, request: &EmbeddingSearchRequest) -> Result<EmbeddingSearchResult>;

    /// Remove an entry by id. Returns false when it did not exist.
    async fn remove(&self, id: &str) -> Result<bool>;

    /// Remove every entry whose metadata passes the filter; returns the count
    async fn remove_all_matching(&self, filter: &Filter) -> Result<usize>;

    /// Number of stored entries
    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

pub(crate) fn check_segment_count(
    embeddings: &[Embedding],
    segments: Option<&Vec<TextSegment>>,
) -> Result<()> {
    if let Some(segments) = segments {
        if segments.len() != embeddings.len() {
            return Err(ChainkitError::InvalidInput(format!(
                "got {} embeddings but {} segments",
                embeddings.len(),
                segments.len()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::key;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_relevance_score_range() {
        assert_eq!(relevance_score(1.0), 1.0);
        assert_eq!(relevance_score(-1.0), 0.0);
        assert_eq!(relevance_score(0.0), 0.5);
    }

    #[test]
    fn test_normalize() {
        let mut embedding = Embedding::new(vec![3.0, 4.0]);
        embedding.normalize();
        assert!((embedding.vector[0] - 0.6).abs() < 1e-6);
        assert!((embedding.vector[1] - 0.8).abs() < 1e-6);

        let mut zero = Embedding::new(vec![0.0, 0.0]);
        zero.normalize();
        assert_eq!(zero.vector, vec![0.0, 0.0]);
    }

    #[test]
    fn test_request_defaults() {
        let request = EmbeddingSearchRequest::builder(vec![1.0, 0.0])
            .build()
            .unwrap();
        assert_eq!(request.max_results(), DEFAULT_MAX_RESULTS);
        assert_eq!(request.min_score(), 0.0);
        assert!(request.filter().is_none());
    }

    #[test]
    fn test_request_validation() {
        assert!(EmbeddingSearchRequest::builder(vec![1.0])
            .max_results(0)
            .build()
            .is_err());
        assert!(EmbeddingSearchRequest::builder(vec![1.0])
            .min_score(1.5)
            .build()
            .is_err());
        assert!(EmbeddingSearchRequest::builder(vec![1.0])
            .min_score(-0.1)
            .build()
            .is_err());
        assert!(EmbeddingSearchRequest::builder(vec![1.0])
            .min_score(1.0)
            .filter(key("a").eq(1))
            .build()
            .is_ok());
    }

    #[test]
    fn test_rank_filters_thresholds_and_sorts() {
        let close = Embedding::new(vec![1.0, 0.1]);
        let far = Embedding::new(vec![0.0, 1.0]);
        let opposite = Embedding::new(vec![-1.0, 0.0]);
        let tagged = TextSegment::with_metadata("close", Metadata::new().put("lang", "en"));

        let candidates = vec![
            Candidate {
                id: "far",
                embedding: &far,
                segment: None,
            },
            Candidate {
                id: "close",
                embedding: &close,
                segment: Some(&tagged),
            },
            Candidate {
                id: "opposite",
                embedding: &opposite,
                segment: None,
            },
        ];

        let request = EmbeddingSearchRequest::builder(vec![1.0, 0.0])
            .min_score(0.4)
            .max_results(10)
            .build()
            .unwrap();
        let matches = rank(candidates, &request).unwrap();
        let ids: Vec<_> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["close", "far"]);
    }

    #[test]
    fn test_entry_id_is_stable() {
        let embedding = Embedding::new(vec![0.5, 0.5]);
        let segment = TextSegment::new("hello");
        assert_eq!(
            entry_id(&embedding, Some(&segment), &[0]),
            entry_id(&embedding, Some(&segment), &[0])
        );
        assert_ne!(
            entry_id(&embedding, Some(&segment), &[0]),
            entry_id(&embedding, Some(&segment), &[1])
        );
    }

    #[test]
    fn test_id_sequences_never_share_salts() {
        let first = IdSequence::starting_at(0);
        let a = first.next_salt();
        assert_ne!(a, first.next_salt());

        // A reopened store restarts its counter but not its epoch
        std::thread::sleep(std::time::Duration::from_millis(2));
        let reopened = IdSequence::starting_at(0);
        assert_ne!(a, reopened.next_salt());
    }

    #[test]
    fn test_rank_rejects_dimension_mismatch() {
        let stored = Embedding::new(vec![1.0, 0.0, 0.0]);
        let candidates = vec![Candidate {
            id: "three-d",
            embedding: &stored,
            segment: None,
        }];
        let request = EmbeddingSearchRequest::builder(vec![1.0, 0.0])
            .build()
            .unwrap();

        let err = rank(candidates, &request).unwrap_err();
        assert!(matches!(err, ChainkitError::InvalidInput(_)));
        assert!(err.to_string().contains("2 dimensions"));
    }
}
