//! Chainkit Core Library
//!
//! Building blocks for applications on top of language models.
//!
//! # Features
//! - Segment metadata with a filter DSL (builder API and text parser)
//! - In-memory and SQLite embedding stores with filtered similarity search
//! - OpenAI-compatible and Mistral AI chat/embedding clients with custom headers
//! - Remote code execution through Judge0

pub mod code;
pub mod config;
pub mod error;
pub mod llm;
pub mod metadata;
pub mod model_names;
pub mod store;

pub use code::{CodeExecutionEngine, CodeExecutionTool, Judge0Engine};
pub use config::{Config, Judge0Config, McpServerConfig, ModelServiceConfig};
pub use error::{ChainkitError, Error, Result};
pub use llm::{
    ChatMessage, ChatModel, EmbeddingModel, MetricsSnapshot, MistralAiClient,
    OpenAiCompatibleClient,
};
pub use metadata::{key, parse_filter, Filter, Metadata, MetadataKey, MetadataValue, TextSegment};
pub use model_names::{Judge0Language, MistralAiChatModelName, MistralAiEmbeddingModelName};
pub use store::{
    Embedding, EmbeddingMatch, EmbeddingSearchRequest, EmbeddingSearchResult, EmbeddingStore,
    InMemoryEmbeddingStore, SqliteEmbeddingStore,
};

/// Default config directory name
pub const CONFIG_DIR_NAME: &str = "chainkit";

/// Default data directory name
pub const DATA_DIR_NAME: &str = "chainkit";
