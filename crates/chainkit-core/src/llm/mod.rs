//! Model integration
//!
//! Provides traits and implementations for:
//! - Chat completion via OpenAI-compatible services (vLLM, OpenAI, Mistral, etc.)
//! - Embedding generation, batched and cached

mod cache;
mod client;
mod mistral;
mod traits;

pub use cache::{ResponseCache, DEFAULT_CACHE_CAPACITY};
pub use client::{
    APIMetrics, MetricsSnapshot, OpenAiCompatibleClient, OpenAiCompatibleClientBuilder,
    DEFAULT_BASE_URL, DEFAULT_USER_AGENT,
};
pub use mistral::{MistralAiClient, MistralAiClientBuilder, MISTRAL_AI_BASE_URL};
pub use traits::*;
