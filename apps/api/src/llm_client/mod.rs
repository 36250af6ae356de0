/// LLM Client: the single point of entry for all Cohere API calls.
///
/// ARCHITECTURAL RULE: No other module may call the Cohere API directly.
/// Chat completion and reranking both go through this module.
use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.cohere.com";
pub const DEFAULT_CHAT_MODEL: &str = "command-r";
pub const DEFAULT_RERANK_MODEL: &str = "rerank-english-v3.0";
const CHAT_PATH: &str = "/v1/chat";
const RERANK_PATH: &str = "/v1/rerank";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited on all {attempts} attempt(s)")]
    RateLimited { attempts: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub text: String,
    #[serde(default)]
    pub generation_id: Option<String>,
    #[serde(default)]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMeta {
    #[serde(default)]
    pub billed_units: Option<BilledUnits>,
}

#[derive(Debug, Deserialize)]
pub struct BilledUnits {
    #[serde(default)]
    pub input_tokens: Option<f64>,
    #[serde(default)]
    pub output_tokens: Option<f64>,
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [&'a str],
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

/// One reranked document: `index` points into the submitted list.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RerankResult {
    pub index: usize,
    pub relevance_score: f32,
}

#[derive(Debug, Deserialize)]
struct CohereError {
    message: String,
}

#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub rerank_model: String,
    pub timeout: Duration,
    /// Total attempts per call. 1 means fail fast on the first error.
    pub max_attempts: u32,
    /// First backoff delay; doubles on each further retry.
    pub retry_base_delay: Duration,
}

impl LlmClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            rerank_model: DEFAULT_RERANK_MODEL.to_string(),
            timeout: Duration::from_secs(60),
            max_attempts: 1,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

/// The single Cohere client used by generation and reranking.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    config: LlmClientConfig,
}

impl LlmClient {
    pub fn new(config: LlmClientConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn chat_model(&self) -> &str {
        &self.config.chat_model
    }

    pub fn rerank_model(&self) -> &str {
        &self.config.rerank_model
    }

    /// Sends `message` as a single user turn and returns the reply text as-is.
    pub async fn chat(&self, message: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.config.chat_model,
            message,
        };
        let response: ChatResponse = self.post_json(CHAT_PATH, &request).await?;

        if let Some(units) = response.meta.as_ref().and_then(|m| m.billed_units.as_ref()) {
            debug!(
                "Chat call succeeded: generation_id={:?}, input_tokens={:?}, output_tokens={:?}",
                response.generation_id, units.input_tokens, units.output_tokens
            );
        }

        if response.text.trim().is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(response.text)
    }

    /// Scores `documents` against `query`, returning at most `top_n` results
    /// ordered by descending relevance.
    pub async fn rerank(
        &self,
        query: &str,
        documents: &[&str],
        top_n: usize,
    ) -> Result<Vec<RerankResult>, LlmError> {
        let request = RerankRequest {
            model: &self.config.rerank_model,
            query,
            documents,
            top_n,
        };
        let response: RerankResponse = self.post_json(RERANK_PATH, &request).await?;
        Ok(response.results)
    }

    /// POSTs JSON and decodes the reply. Retries on 429, 5xx and transport
    /// errors with exponential backoff while attempts remain.
    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, LlmError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error: Option<LlmError> = None;
        let mut rate_limited = 0u32;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = backoff_delay(self.config.retry_base_delay, attempt);
                warn!(
                    "Cohere call to {} attempt {} failed, retrying after {}ms...",
                    path,
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .header("accept", "application/json")
                .json(body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                if status.as_u16() == 429 {
                    rate_limited += 1;
                }
                let body = response.text().await.unwrap_or_default();
                warn!("Cohere API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: error_message(body),
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: error_message(body),
                });
            }

            let text = response.text().await?;
            return serde_json::from_str(&text).map_err(LlmError::Parse);
        }

        match last_error {
            Some(e) if rate_limited < max_attempts => Err(e),
            _ => Err(LlmError::RateLimited {
                attempts: max_attempts,
            }),
        }
    }
}

/// Delay before retry number `attempt` (1-based): `base`, `2 * base`,
/// `4 * base`, ... saturating instead of overflowing.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = attempt
        .checked_sub(1)
        .and_then(|shift| 1u32.checked_shl(shift))
        .unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// Pulls `message` out of a Cohere error body, falling back to the raw body.
fn error_message(body: String) -> String {
    serde_json::from_str::<CohereError>(&body)
        .map(|e| e.message)
        .unwrap_or(body)
}
