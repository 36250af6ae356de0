use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::document::splitter::{ChunkPolicy, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::llm_client::{LlmClientConfig, DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_RERANK_MODEL};
use crate::retrieval::embedder::{EmbeddingConfig, DEFAULT_EMBEDDING_API_URL, DEFAULT_EMBEDDING_MODEL};
use crate::retrieval::retriever::{RetrievalSettings, DEFAULT_TOP_N};

/// Upper bound for `LLM_MAX_ATTEMPTS`; backoff doubles on every retry.
pub const MAX_LLM_ATTEMPTS: u32 = 10;

/// Which reranker narrows the similarity candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerankerKind {
    Cohere,
    Lexical,
    None,
}

impl FromStr for RerankerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cohere" => Ok(Self::Cohere),
            "lexical" => Ok(Self::Lexical),
            "none" | "off" => Ok(Self::None),
            other => bail!("RERANKER must be one of cohere, lexical, none (got '{other}')"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub cohere_api_key: String,
    pub cohere_api_url: String,
    pub generation_model: String,
    pub reranker: RerankerKind,
    pub rerank_model: String,
    pub rerank_top_n: usize,
    pub retrieval_max_k: Option<usize>,
    pub embedding_api_url: String,
    pub embedding_model: String,
    pub hf_api_token: Option<String>,
    pub tokenizer: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_job_description_chars: usize,
    pub max_upload_bytes: usize,
    pub http_timeout: Duration,
    pub llm_max_attempts: u32,
    pub session_ttl: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Config {
            cohere_api_key: get("COHERE_API_KEY").with_context(|| {
                "Required environment variable 'COHERE_API_KEY' is not set".to_string()
            })?,
            cohere_api_url: get("COHERE_API_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            generation_model: get("GENERATION_MODEL")
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            reranker: parse_or(get("RERANKER"), "RERANKER", RerankerKind::Cohere)?,
            rerank_model: get("RERANK_MODEL").unwrap_or_else(|| DEFAULT_RERANK_MODEL.to_string()),
            rerank_top_n: parse_or(get("RERANK_TOP_N"), "RERANK_TOP_N", DEFAULT_TOP_N)?,
            retrieval_max_k: get("RETRIEVAL_MAX_K")
                .map(|v| parse_value::<usize>(&v, "RETRIEVAL_MAX_K"))
                .transpose()?,
            embedding_api_url: get("EMBEDDING_API_URL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_API_URL.to_string()),
            embedding_model: get("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            hf_api_token: get("HF_API_TOKEN"),
            tokenizer: get("TOKENIZER").unwrap_or_else(|| "gpt2".to_string()),
            chunk_size: parse_or(get("CHUNK_SIZE"), "CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
            chunk_overlap: parse_or(get("CHUNK_OVERLAP"), "CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP)?,
            max_job_description_chars: parse_or(
                get("MAX_JOB_DESCRIPTION_CHARS"),
                "MAX_JOB_DESCRIPTION_CHARS",
                5000,
            )?,
            max_upload_bytes: parse_or(get("MAX_UPLOAD_BYTES"), "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            http_timeout: Duration::from_secs(parse_or(
                get("HTTP_TIMEOUT_SECS"),
                "HTTP_TIMEOUT_SECS",
                60,
            )?),
            llm_max_attempts: parse_attempts(get("LLM_MAX_ATTEMPTS"))?,
            session_ttl: Duration::from_secs(
                60 * parse_or::<u64>(get("SESSION_TTL_MINUTES"), "SESSION_TTL_MINUTES", 60)?,
            ),
            port: parse_or(get("PORT"), "PORT", 8080)?,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn chunk_policy(&self) -> ChunkPolicy {
        ChunkPolicy {
            max_tokens: self.chunk_size,
            overlap: self.chunk_overlap,
        }
    }

    pub fn llm_client_config(&self) -> LlmClientConfig {
        LlmClientConfig {
            base_url: self.cohere_api_url.clone(),
            chat_model: self.generation_model.clone(),
            rerank_model: self.rerank_model.clone(),
            timeout: self.http_timeout,
            max_attempts: self.llm_max_attempts,
            ..LlmClientConfig::new(self.cohere_api_key.clone())
        }
    }

    pub fn embedding_config(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            api_url: self.embedding_api_url.clone(),
            model: self.embedding_model.clone(),
            api_token: self.hf_api_token.clone(),
            timeout: self.http_timeout,
            max_attempts: self.llm_max_attempts,
            ..EmbeddingConfig::default()
        }
    }

    pub fn retrieval_settings(&self) -> RetrievalSettings {
        RetrievalSettings {
            max_k: self.retrieval_max_k,
            top_n: self.rerank_top_n,
        }
    }
}

fn parse_value<T>(raw: &str, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("{key} has an invalid value '{raw}'"))
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map_or(Ok(default), |v| parse_value(&v, key))
}

fn parse_attempts(raw: Option<String>) -> Result<u32> {
    let attempts = parse_or(raw, "LLM_MAX_ATTEMPTS", 1)?;
    if !(1..=MAX_LLM_ATTEMPTS).contains(&attempts) {
        bail!("LLM_MAX_ATTEMPTS must be between 1 and {MAX_LLM_ATTEMPTS} (got {attempts})");
    }
    Ok(attempts)
}
