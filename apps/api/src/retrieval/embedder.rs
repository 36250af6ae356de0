//! Embedder: maps chunk and query text to fixed-dimension vectors through
//! the Hugging Face feature-extraction API.
//!
//! `LazyEmbedder` is the process-wide handle: it connects on first use,
//! caches the connected client, and shares it read-only afterwards. A failed
//! connection is not cached, so the next call tries again.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::llm_client::backoff_delay;
use crate::pipeline::error::PipelineError;

pub const DEFAULT_EMBEDDING_API_URL: &str = "https://router.huggingface.co/hf-inference/models";
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-mpnet-base-v2";
const BATCH_SIZE: usize = 32;
const PROBE_TEXT: &str = "dimension probe";

#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    /// Embeds `texts`, returning exactly one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::EmbeddingUnavailable("empty embedding result".to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub api_url: String,
    pub model: String,
    pub api_token: Option<String>,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_EMBEDDING_API_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            api_token: None,
            timeout: Duration::from_secs(60),
            max_attempts: 1,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a [String],
}

/// Sentence-transformer models return one pooled vector per input; raw
/// transformer models return one vector per token.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureExtractionResponse {
    Pooled(Vec<Vec<f32>>),
    TokenLevel(Vec<Vec<Vec<f32>>>),
}

impl FeatureExtractionResponse {
    fn into_vectors(self) -> Vec<Vec<f32>> {
        match self {
            FeatureExtractionResponse::Pooled(vectors) => vectors,
            FeatureExtractionResponse::TokenLevel(per_input) => {
                per_input.into_iter().map(|tokens| mean_pool(&tokens)).collect()
            }
        }
    }
}

fn mean_pool(tokens: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = tokens.first() else {
        return Vec::new();
    };
    let mut pooled = vec![0.0_f32; first.len()];
    for token in tokens {
        for (acc, value) in pooled.iter_mut().zip(token) {
            *acc += value;
        }
    }
    let n = tokens.len() as f32;
    pooled.iter_mut().for_each(|v| *v /= n);
    pooled
}

/// Connected Hugging Face embedding client with a known dimensionality.
pub struct HuggingFaceEmbedder {
    client: Client,
    endpoint: String,
    config: EmbeddingConfig,
    dimension: usize,
}

impl HuggingFaceEmbedder {
    /// Builds the client and probes the model once to learn its dimension.
    pub async fn connect(config: EmbeddingConfig) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PipelineError::EmbeddingUnavailable(format!("HTTP client: {e}")))?;
        let endpoint = format!(
            "{}/{}/pipeline/feature-extraction",
            config.api_url.trim_end_matches('/'),
            config.model
        );

        let mut embedder = Self {
            client,
            endpoint,
            config,
            dimension: 0,
        };
        let probe = embedder.request(&[PROBE_TEXT.to_string()]).await?;
        embedder.dimension = probe.first().map(Vec::len).unwrap_or(0);
        if embedder.dimension == 0 {
            return Err(PipelineError::EmbeddingUnavailable(format!(
                "model '{}' returned an empty probe vector",
                embedder.config.model
            )));
        }

        info!(
            "Embedding model '{}' ready ({} dimensions)",
            embedder.config.model, embedder.dimension
        );
        Ok(embedder)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = backoff_delay(self.config.retry_base_delay, attempt);
                warn!(
                    "Embedding attempt {} failed ({}), retrying after {}ms...",
                    attempt,
                    last_error,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .post(&self.endpoint)
                .json(&FeatureExtractionRequest { inputs });
            if let Some(token) = &self.config.api_token {
                request = request.bearer_auth(token);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = e.to_string();
                    continue;
                }
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                last_error = format!("status {status}");
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(PipelineError::EmbeddingUnavailable(format!(
                    "status {status}: {body}"
                )));
            }

            let parsed: FeatureExtractionResponse = response.json().await.map_err(|e| {
                PipelineError::EmbeddingUnavailable(format!("malformed embedding response: {e}"))
            })?;
            let vectors = parsed.into_vectors();
            if vectors.len() != inputs.len() {
                return Err(PipelineError::EmbeddingUnavailable(format!(
                    "model returned {} embeddings for {} inputs",
                    vectors.len(),
                    inputs.len()
                )));
            }
            return Ok(vectors);
        }

        Err(PipelineError::EmbeddingUnavailable(last_error))
    }
}

#[async_trait]
impl Embedder for HuggingFaceEmbedder {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            let embedded = self.request(batch).await?;
            if let Some(bad) = embedded.iter().find(|v| v.len() != self.dimension()) {
                return Err(PipelineError::EmbeddingUnavailable(format!(
                    "model returned a {}-dimension vector, expected {}",
                    bad.len(),
                    self.dimension()
                )));
            }
            vectors.extend(embedded);
        }
        debug!(
            "Embedded {} texts with '{}' ({} dimensions)",
            texts.len(),
            self.config.model,
            self.dimension()
        );
        Ok(vectors)
    }
}

/// Lazily connected, process-wide embedder.
pub struct LazyEmbedder {
    config: EmbeddingConfig,
    cell: OnceCell<HuggingFaceEmbedder>,
}

impl LazyEmbedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    async fn get(&self) -> Result<&HuggingFaceEmbedder, PipelineError> {
        if !self.is_initialized() {
            debug!("Connecting embedding model '{}'", self.config.model);
        }
        self.cell
            .get_or_try_init(|| HuggingFaceEmbedder::connect(self.config.clone()))
            .await
    }
}

#[async_trait]
impl Embedder for LazyEmbedder {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        self.get().await?.embed(texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    use crate::test_support::{spawn_stub, unreachable_url};

    const ROUTE: &str = "/test-model/pipeline/feature-extraction";

    fn config(api_url: String) -> EmbeddingConfig {
        EmbeddingConfig {
            api_url,
            model: "test-model".to_string(),
            timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    /// Pooled stub: `[chars, words, 1.0]` per input, counting requests.
    fn pooled_stub(calls: Arc<AtomicUsize>) -> Router {
        Router::new().route(
            ROUTE,
            post(move |Json(body): Json<Value>| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let vectors: Vec<Value> = body["inputs"]
                        .as_array()
                        .unwrap()
                        .iter()
                        .map(|t| {
                            let t = t.as_str().unwrap();
                            json!([t.len() as f32, t.split_whitespace().count() as f32, 1.0])
                        })
                        .collect();
                    Json(Value::Array(vectors))
                }
            }),
        )
    }

    #[test]
    fn test_mean_pool_averages_tokens() {
        let pooled = mean_pool(&[vec![1.0, 2.0], vec![3.0, 6.0]]);
        assert_eq!(pooled, vec![2.0, 4.0]);
        assert!(mean_pool(&[]).is_empty());
    }

    #[test]
    fn test_token_level_response_is_pooled() {
        let raw = r#"[[[1.0, 0.0], [0.0, 1.0]], [[2.0, 2.0]]]"#;
        let parsed: FeatureExtractionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.into_vectors(), vec![vec![0.5, 0.5], vec![2.0, 2.0]]);
    }

    #[tokio::test]
    async fn test_embed_returns_one_vector_per_input_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = spawn_stub(pooled_stub(calls)).await;
        let embedder = HuggingFaceEmbedder::connect(config(base)).await.unwrap();
        assert_eq!(embedder.dimension(), 3);

        let texts = vec![
            "Python".to_string(),
            "backend engineer".to_string(),
            "five years of Rust".to_string(),
        ];
        let vectors = embedder.embed(&texts).await.unwrap();

        assert_eq!(vectors.len(), 3);
        assert!(vectors.iter().all(|v| v.len() == 3));
        assert_eq!(vectors[0], vec![6.0, 1.0, 1.0]);
        assert_eq!(vectors[1], vec![16.0, 2.0, 1.0]);
        assert_eq!(vectors[2][1], 4.0);
    }

    #[tokio::test]
    async fn test_embedding_is_stable_across_calls() {
        let base = spawn_stub(pooled_stub(Arc::new(AtomicUsize::new(0)))).await;
        let embedder = HuggingFaceEmbedder::connect(config(base)).await.unwrap();

        let first = embedder.embed_query("backend engineer").await.unwrap();
        let second = embedder.embed_query("backend engineer").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_large_inputs_are_batched() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = spawn_stub(pooled_stub(calls.clone())).await;
        let embedder = HuggingFaceEmbedder::connect(config(base)).await.unwrap();
        let texts: Vec<String> = (0..(BATCH_SIZE + 5)).map(|i| format!("chunk {i}")).collect();

        let vectors = embedder.embed(&texts).await.unwrap();

        assert_eq!(vectors.len(), texts.len());
        // probe + two batches
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_lazy_embedder_connects_once_on_first_use() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = spawn_stub(pooled_stub(calls.clone())).await;
        let embedder = LazyEmbedder::new(config(base));

        assert!(!embedder.is_initialized());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        embedder.embed(&["first".to_string()]).await.unwrap();
        assert!(embedder.is_initialized());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        embedder.embed_query("second").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unreachable_service_is_embedding_unavailable_and_not_cached() {
        let embedder = LazyEmbedder::new(config(unreachable_url().await));

        let result = embedder.embed(&["text".to_string()]).await;
        assert!(matches!(result, Err(PipelineError::EmbeddingUnavailable(_))));
        assert!(!embedder.is_initialized());
    }

    #[tokio::test]
    async fn test_count_mismatch_is_embedding_unavailable() {
        let app = Router::new().route(ROUTE, post(|| async { Json(json!([[1.0, 2.0]])) }));
        let base = spawn_stub(app).await;
        let embedder = HuggingFaceEmbedder::connect(config(base)).await.unwrap();

        let result = embedder
            .embed(&["one".to_string(), "two".to_string()])
            .await;
        assert!(matches!(result, Err(PipelineError::EmbeddingUnavailable(_))));
    }

    #[tokio::test]
    async fn test_model_error_status_is_embedding_unavailable() {
        let app = Router::new().route(
            ROUTE,
            post(|| async {
                (
                    axum::http::StatusCode::NOT_FOUND,
                    Json(json!({"error": "Model test-model does not exist"})),
                )
            }),
        );
        let base = spawn_stub(app).await;
        let result = HuggingFaceEmbedder::connect(config(base)).await;
        assert!(matches!(result, Err(PipelineError::EmbeddingUnavailable(_))));
    }
}
