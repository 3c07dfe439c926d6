//! HTTP client for OpenAI-compatible model services (vLLM, OpenAI, Mistral, etc.)

use super::cache::{chat_cache_key, embedding_cache_key, ResponseCache};
use super::traits::{ChatMessage, ChatModel, EmbeddingModel};
use crate::config::ModelServiceConfig;
use crate::error::{ChainkitError, Result};
use crate::store::Embedding;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Base URL used when none is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/v1";

/// `user-agent` sent unless a custom header replaces it
pub const DEFAULT_USER_AGENT: &str = concat!("chainkit/", env!("CARGO_PKG_VERSION"));

const DEFAULT_CHAT_MODEL: &str = "meta-llama/Llama-3.1-8B-Instruct";
const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// API metrics for monitoring
#[derive(Debug, Default)]
pub struct APIMetrics {
    pub total_requests: AtomicU64,
    pub total_errors: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub total_latency_ms: AtomicU64,
}

impl APIMetrics {
    fn error(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot of API metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub total_errors: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub avg_latency_ms: f64,
}

/// Client for services speaking the OpenAI `/chat/completions` and
/// `/embeddings` protocol
pub struct OpenAiCompatibleClient {
    http_client: reqwest::Client,
    headers: HeaderMap,
    base_url: String,
    api_key: Option<String>,
    model_name: String,
    embedding_model_name: String,
    embedding_dimension: usize,
    temperature: f32,
    max_tokens: Option<u32>,
    log_requests: bool,
    cache: ResponseCache,
    metrics: APIMetrics,
}

/// Builder for [`OpenAiCompatibleClient`]
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClientBuilder {
    base_url: String,
    api_key: Option<String>,
    model_name: String,
    embedding_model_name: String,
    embedding_dimension: usize,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout: Duration,
    custom_headers: Vec<(String, String)>,
    log_requests: bool,
    cache_ttl: Option<Duration>,
}

impl Default for OpenAiCompatibleClientBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model_name: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model_name: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            timeout: DEFAULT_TIMEOUT,
            custom_headers: Vec::new(),
            log_requests: false,
            cache_ttl: None,
        }
    }
}

impl OpenAiCompatibleClientBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    pub fn embedding_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.embedding_model_name = model_name.into();
        self
    }

    pub fn embedding_dimension(mut self, dimension: usize) -> Self {
        self.embedding_dimension = dimension;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Timeout applied to every request
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extra headers sent with every request. They replace default headers
    /// of the same name, `user-agent` included.
    pub fn custom_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.custom_headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn custom_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.push((name.into(), value.into()));
        self
    }

    /// Log request and response bodies at `info`
    pub fn log_requests(mut self, log_requests: bool) -> Self {
        self.log_requests = log_requests;
        self
    }

    /// Time-to-live of cached responses (default one hour)
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn build(self) -> Result<OpenAiCompatibleClient> {
        let headers = build_headers(&self.custom_headers)?;

        let http_client = reqwest::Client::builder()
            .timeout(self.timeout)
            .default_headers(headers.clone())
            .build()?;

        let cache = match self.cache_ttl {
            Some(ttl) => ResponseCache::with_ttl(ttl),
            None => ResponseCache::new(),
        };

        Ok(OpenAiCompatibleClient {
            http_client,
            headers,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            api_key: self.api_key,
            model_name: self.model_name,
            embedding_model_name: self.embedding_model_name,
            embedding_dimension: self.embedding_dimension,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            log_requests: self.log_requests,
            cache,
            metrics: APIMetrics::default(),
        })
    }
}

/// Default headers overlaid with the custom ones
pub(crate) fn build_headers(custom: &[(String, String)]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));

    for (name, value) in custom {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ChainkitError::InvalidHeader(format!("{}: {}", name, e)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| ChainkitError::InvalidHeader(format!("{}: {}", name, e)))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

impl OpenAiCompatibleClient {
    pub fn builder() -> OpenAiCompatibleClientBuilder {
        OpenAiCompatibleClientBuilder::default()
    }

    /// Create from configuration
    pub fn from_config(config: &ModelServiceConfig) -> Result<Self> {
        let mut builder = Self::builder()
            .base_url(&config.url)
            .model_name(&config.model)
            .embedding_model_name(&config.embedding_model)
            .temperature(config.temperature)
            .timeout(Duration::from_secs(config.timeout_secs))
            .custom_headers(config.custom_headers.clone())
            .log_requests(config.log_requests);

        if let Some(dimension) = config.embedding_dimensions {
            builder = builder.embedding_dimension(dimension);
        }
        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key);
        }
        if let Some(max_tokens) = config.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }

        builder.build()
    }

    /// Headers sent with every request
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Value of one effective header, if set and printable
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn embedding_model_name(&self) -> &str {
        &self.embedding_model_name
    }

    /// Get current API metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        let total = self.metrics.total_requests.load(Ordering::Relaxed);
        let hits = self.metrics.cache_hits.load(Ordering::Relaxed);
        let misses = self.metrics.cache_misses.load(Ordering::Relaxed);

        MetricsSnapshot {
            total_requests: total,
            total_errors: self.metrics.total_errors.load(Ordering::Relaxed),
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate: if total > 0 {
                hits as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            avg_latency_ms: if total > 0 {
                self.metrics.total_latency_ms.load(Ordering::Relaxed) as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    /// Embed texts in parallel with multiple concurrent batches
    ///
    /// Results come back in input order regardless of which batch finishes
    /// first.
    pub async fn embed_all_parallel(
        &self,
        texts: &[String],
        batch_size: usize,
        max_concurrent: usize,
    ) -> Result<Vec<Embedding>> {
        const DEFAULT_BATCH_SIZE: usize = 32;
        const DEFAULT_CONCURRENT: usize = 4;

        let chunk_size = if batch_size > 0 {
            batch_size
        } else {
            DEFAULT_BATCH_SIZE
        };
        let concurrent = if max_concurrent > 0 {
            max_concurrent
        } else {
            DEFAULT_CONCURRENT
        };

        let chunks: Vec<_> = texts.chunks(chunk_size).collect();
        let total_chunks = chunks.len();

        tracing::info!(
            "Embedding {} texts in {} batches ({} concurrent)",
            texts.len(),
            total_chunks,
            concurrent
        );

        let mut results: Vec<_> = stream::iter(chunks)
            .enumerate()
            .map(|(idx, chunk)| async move {
                tracing::debug!("Processing batch {}/{}", idx + 1, total_chunks);
                (idx, self.embed_all(chunk).await)
            })
            .buffer_unordered(concurrent)
            .collect()
            .await;

        results.sort_by_key(|(idx, _)| *idx);

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for (_, result) in results {
            all_embeddings.extend(result?);
        }

        Ok(all_embeddings)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B, service: &str) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);

        if self.log_requests {
            tracing::info!(
                "Request to {}: {}",
                url,
                serde_json::to_string(body).unwrap_or_default()
            );
        }

        let mut req = self.http_client.post(&url).json(body);
        if let Some(ref api_key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req.send().await.map_err(|e| {
            self.metrics.error();
            ChainkitError::Http(e)
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            self.metrics.error();
            ChainkitError::Http(e)
        })?;

        if self.log_requests {
            tracing::info!("Response from {} (HTTP {}): {}", url, status, text);
        }

        if !status.is_success() {
            self.metrics.error();
            return Err(ChainkitError::ExternalError(format!(
                "{} error (HTTP {}): {}",
                service, status, text
            )));
        }

        serde_json::from_str(&text).map_err(|e| {
            self.metrics.error();
            ChainkitError::Serialization(e)
        })
    }

    fn record_latency(&self, start: Instant) {
        let elapsed = start.elapsed().as_millis() as u64;
        self.metrics
            .total_latency_ms
            .fetch_add(elapsed, Ordering::Relaxed);
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatibleClient {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let start = Instant::now();
        self.metrics.total_requests.fetch_add(1, Ordering::Relaxed);

        let messages_json = serde_json::to_string(&messages)?;
        let cache_key = chat_cache_key(&self.model_name, self.temperature, &messages_json);

        if let Some(cached) = self.cache.get(&cache_key) {
            tracing::debug!("Cache hit for chat completion");
            self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached);
        }

        self.metrics.cache_misses.fetch_add(1, Ordering::Relaxed);

        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: Vec<ChatMessage>,
            temperature: f32,
            #[serde(skip_serializing_if = "Option::is_none")]
            max_tokens: Option<u32>,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<ChatChoice>,
        }

        #[derive(Deserialize)]
        struct ChatChoice {
            message: ChatMessage,
        }

        let request = ChatRequest {
            model: &self.model_name,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let chat_response: ChatResponse = self
            .post_json("/chat/completions", &request, "Chat service")
            .await?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| {
                self.metrics.error();
                ChainkitError::Llm("No response from model".to_string())
            })?
            .message
            .content;

        self.cache.set(cache_key, content.clone());
        self.record_latency(start);

        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[async_trait]
impl EmbeddingModel for OpenAiCompatibleClient {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let results = self.embed_all(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| ChainkitError::Llm("No embedding returned".to_string()))
    }

    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let start = Instant::now();
        self.metrics.total_requests.fetch_add(1, Ordering::Relaxed);

        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut uncached_texts = Vec::new();
        let mut uncached_indices = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            let cache_key = embedding_cache_key(&self.embedding_model_name, text);
            if let Some(cached) = self.cache.get(&cache_key) {
                if let Ok(vector) = serde_json::from_str::<Vec<f32>>(&cached) {
                    results.push(Some(vector));
                    self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            }
            self.metrics.cache_misses.fetch_add(1, Ordering::Relaxed);
            results.push(None);
            uncached_texts.push(text.clone());
            uncached_indices.push(i);
        }

        if !uncached_texts.is_empty() {
            tracing::debug!(
                "Embedding batch: {} cached, {} to fetch",
                texts.len() - uncached_texts.len(),
                uncached_texts.len()
            );

            #[derive(Serialize)]
            struct EmbedRequest<'a> {
                model: &'a str,
                input: &'a [String],
            }

            #[derive(Deserialize)]
            struct EmbedResponse {
                data: Vec<EmbedData>,
            }

            #[derive(Deserialize)]
            struct EmbedData {
                embedding: Vec<f32>,
            }

            let request = EmbedRequest {
                model: &self.embedding_model_name,
                input: &uncached_texts,
            };

            let embed_response: EmbedResponse = self
                .post_json("/embeddings", &request, "Embedding service")
                .await?;

            if embed_response.data.len() != uncached_texts.len() {
                self.metrics.error();
                return Err(ChainkitError::Llm(format!(
                    "Expected {} embeddings, got {}",
                    uncached_texts.len(),
                    embed_response.data.len()
                )));
            }

            for ((data, idx), text) in embed_response
                .data
                .into_iter()
                .zip(&uncached_indices)
                .zip(&uncached_texts)
            {
                if let Ok(json) = serde_json::to_string(&data.embedding) {
                    self.cache
                        .set(embedding_cache_key(&self.embedding_model_name, text), json);
                }
                results[*idx] = Some(data.embedding);
            }
        } else {
            tracing::debug!("All {} embeddings from cache", texts.len());
        }

        self.record_latency(start);

        results
            .into_iter()
            .map(|r| {
                r.map(Embedding::new)
                    .ok_or_else(|| ChainkitError::Llm("Missing embedding in batch".to_string()))
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn model_name(&self) -> &str {
        &self.embedding_model_name
    }
}
