//! Mistral AI client

use super::client::{MetricsSnapshot, OpenAiCompatibleClient};
use super::traits::{ChatMessage, ChatModel, EmbeddingModel};
use crate::error::Result;
use crate::model_names::{MistralAiChatModelName, MistralAiEmbeddingModelName};
use crate::store::Embedding;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::time::Duration;

/// Mistral AI API endpoint
pub const MISTRAL_AI_BASE_URL: &str = "https://api.mistral.ai/v1";

/// Chat and embedding client for Mistral AI
pub struct MistralAiClient {
    inner: OpenAiCompatibleClient,
    chat_model: MistralAiChatModelName,
    embedding_model: MistralAiEmbeddingModelName,
}

/// Builder for [`MistralAiClient`]
pub struct MistralAiClientBuilder {
    api_key: String,
    base_url: String,
    chat_model: MistralAiChatModelName,
    embedding_model: MistralAiEmbeddingModelName,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout: Option<Duration>,
    custom_headers: Vec<(String, String)>,
    log_requests: bool,
}

impl MistralAiClientBuilder {
    /// Override the endpoint (proxies, self-hosted gateways)
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model_name(mut self, model: MistralAiChatModelName) -> Self {
        self.chat_model = model;
        self
    }

    pub fn embedding_model_name(mut self, model: MistralAiEmbeddingModelName) -> Self {
        self.embedding_model = model;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn custom_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.push((name.into(), value.into()));
        self
    }

    pub fn log_requests(mut self, log_requests: bool) -> Self {
        self.log_requests = log_requests;
        self
    }

    pub fn build(self) -> Result<MistralAiClient> {
        let mut builder = OpenAiCompatibleClient::builder()
            .base_url(self.base_url)
            .api_key(self.api_key)
            .model_name(self.chat_model.as_str())
            .embedding_model_name(self.embedding_model.as_str())
            .embedding_dimension(self.embedding_model.dimension())
            .custom_headers(self.custom_headers)
            .log_requests(self.log_requests);

        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(MistralAiClient {
            inner: builder.build()?,
            chat_model: self.chat_model,
            embedding_model: self.embedding_model,
        })
    }
}

impl MistralAiClient {
    pub fn builder(api_key: impl Into<String>) -> MistralAiClientBuilder {
        MistralAiClientBuilder {
            api_key: api_key.into(),
            base_url: MISTRAL_AI_BASE_URL.to_string(),
            chat_model: MistralAiChatModelName::MistralSmallLatest,
            embedding_model: MistralAiEmbeddingModelName::MistralEmbed,
            temperature: None,
            max_tokens: None,
            timeout: None,
            custom_headers: Vec::new(),
            log_requests: false,
        }
    }

    pub fn chat_model(&self) -> MistralAiChatModelName {
        self.chat_model
    }

    pub fn embedding_model(&self) -> MistralAiEmbeddingModelName {
        self.embedding_model
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn base_url(&self) -> &str {
        self.inner.base_url()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics()
    }
}

#[async_trait]
impl ChatModel for MistralAiClient {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        self.inner.chat(messages).await
    }

    fn model_name(&self) -> &str {
        self.chat_model.as_str()
    }
}

#[async_trait]
impl EmbeddingModel for MistralAiClient {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.inner.embed(text).await
    }

    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        self.inner.embed_all(texts).await
    }

    fn dimension(&self) -> usize {
        self.embedding_model.dimension()
    }

    fn model_name(&self) -> &str {
        self.embedding_model.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let client = MistralAiClient::builder("key").build().unwrap();

        assert_eq!(client.base_url(), MISTRAL_AI_BASE_URL);
        assert_eq!(ChatModel::model_name(&client), "mistral-small-latest");
        assert_eq!(EmbeddingModel::model_name(&client), "mistral-embed");
        assert_eq!(client.dimension(), 1024);
    }

    #[test]
    fn test_model_and_headers() {
        let client = MistralAiClient::builder("key")
            .model_name(MistralAiChatModelName::CodestralLatest)
            .custom_header("x-trace", "abc")
            .build()
            .unwrap();

        assert_eq!(client.chat_model(), MistralAiChatModelName::CodestralLatest);
        assert_eq!(
            client.headers().get("x-trace").and_then(|v| v.to_str().ok()),
            Some("abc")
        );
    }
}
