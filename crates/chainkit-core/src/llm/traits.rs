//! Model trait definitions

use crate::error::Result;
use crate::store::Embedding;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Chat message for completion requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion model
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a reply to the conversation
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Embedding generation model
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Generate embedding for single text
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generate embeddings for a batch of texts, in input order
    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Get embedding dimensions
    fn dimension(&self) -> usize;

    /// Get model name
    fn model_name(&self) -> &str;
}
