//! Stand-ins shared by unit tests: stub HTTP services, a deterministic
//! embedder, a fixed-page extractor and a scripted text generator.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use axum::Router;

use crate::document::loader::{ExtractedPages, PageExtractor};
use crate::document::splitter::Chunk;
use crate::generation::chain::TextGenerator;
use crate::generation::template::PromptInstance;
use crate::pipeline::error::PipelineError;
use crate::retrieval::embedder::Embedder;

/// Serves `app` on an ephemeral localhost port and returns its base URL.
pub async fn spawn_stub(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// A base URL nothing is listening on.
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Chunks numbered in order, one per text.
pub fn chunks_from(texts: &[&str]) -> Vec<Chunk> {
    texts
        .iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            index,
            text: text.to_string(),
            page: Some(0),
            total_pages: 1,
            token_count: text.split_whitespace().count(),
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// KeywordEmbedder
// ────────────────────────────────────────────────────────────────────────────

const KEYWORD_VOCAB: &[&str] = &[
    "python", "backend", "engineer", "sales", "marketing", "rust", "design",
];

/// Deterministic embedder whose dimensions count vocabulary words, so
/// distances between texts are known in advance.
pub struct KeywordEmbedder;

impl KeywordEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .map(str::to_lowercase)
            .collect();
        KEYWORD_VOCAB
            .iter()
            .map(|term| words.iter().filter(|w| w == term).count() as f32)
            .collect()
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-stub"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// StaticExtractor
// ────────────────────────────────────────────────────────────────────────────

/// Returns the same pages for any file.
pub struct StaticExtractor {
    pages: Vec<String>,
}

impl StaticExtractor {
    pub fn new(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl PageExtractor for StaticExtractor {
    fn name(&self) -> &str {
        "static"
    }

    fn extract(&self, _path: &Path) -> Result<ExtractedPages, PipelineError> {
        Ok(ExtractedPages {
            pages: self.pages.clone(),
            page_count: self.pages.len(),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ScriptedGenerator
// ────────────────────────────────────────────────────────────────────────────

/// Replies with a fixed text and records every prompt it receives.
pub struct ScriptedGenerator {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &PromptInstance) -> Result<String, PipelineError> {
        self.prompts.lock().unwrap().push(prompt.as_str().to_string());
        Ok(self.reply.clone())
    }
}
