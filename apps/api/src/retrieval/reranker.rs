//! Rerankers: narrow the similarity candidates to the few chunks that best
//! answer the query, keeping the generation prompt short.
//!
//! Default: `CohereReranker` (cross-encoder via the Cohere rerank endpoint).
//! Offline: `LexicalReranker` (keyword coverage, no network).

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;

use crate::llm_client::LlmClient;
use crate::pipeline::error::PipelineError;
use crate::retrieval::index::ScoredChunk;

#[async_trait]
pub trait Reranker: Send + Sync {
    fn name(&self) -> &str;

    /// Re-scores `candidates` against `query` and returns at most `top_n` of
    /// them, most relevant first. Scores in the output are the reranker's own.
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredChunk>,
        top_n: usize,
    ) -> Result<Vec<ScoredChunk>, PipelineError>;
}

// ────────────────────────────────────────────────────────────────────────────
// CohereReranker
// ────────────────────────────────────────────────────────────────────────────

pub struct CohereReranker {
    llm: LlmClient,
}

impl CohereReranker {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Reranker for CohereReranker {
    fn name(&self) -> &str {
        "cohere"
    }

    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredChunk>,
        top_n: usize,
    ) -> Result<Vec<ScoredChunk>, PipelineError> {
        if candidates.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }

        let documents: Vec<&str> = candidates.iter().map(|c| c.chunk.text.as_str()).collect();
        let results = self
            .llm
            .rerank(query, &documents, top_n.min(documents.len()))
            .await
            .map_err(|e| PipelineError::RerankUnavailable(e.to_string()))?;

        let mut reranked = Vec::with_capacity(results.len());
        for result in results.into_iter().take(top_n) {
            let candidate = candidates.get(result.index).ok_or_else(|| {
                PipelineError::RerankUnavailable(format!(
                    "rerank result index {} out of range for {} candidates",
                    result.index,
                    candidates.len()
                ))
            })?;
            reranked.push(ScoredChunk {
                chunk: candidate.chunk.clone(),
                score: result.relevance_score,
            });
        }

        debug!(
            "Cohere rerank ({}) kept {} of {} candidates",
            self.llm.rerank_model(),
            reranked.len(),
            candidates.len()
        );
        Ok(reranked)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LexicalReranker
// ────────────────────────────────────────────────────────────────────────────

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it", "of", "on",
    "or", "our", "the", "to", "we", "will", "with", "you", "your",
];

/// Keyword-coverage reranker.
///
/// Score = fraction of distinct query keywords present in the chunk. Ties
/// fall back to the incoming (similarity) order.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalReranker;

#[async_trait]
impl Reranker for LexicalReranker {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredChunk>,
        top_n: usize,
    ) -> Result<Vec<ScoredChunk>, PipelineError> {
        let query_terms = keywords(query);

        let mut rescored: Vec<ScoredChunk> = candidates
            .into_iter()
            .map(|candidate| {
                let score = coverage(&query_terms, &keywords(&candidate.chunk.text));
                ScoredChunk {
                    chunk: candidate.chunk,
                    score,
                }
            })
            .collect();

        // Stable sort keeps similarity order among equal coverage.
        rescored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        rescored.truncate(top_n);
        Ok(rescored)
    }
}

fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '+' && c != '#')
        .map(|w| w.trim_matches(|c: char| c == '+' || c == '#').to_lowercase())
        .filter(|w| !w.is_empty() && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn coverage(query_terms: &HashSet<String>, chunk_terms: &HashSet<String>) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let hits = query_terms.intersection(chunk_terms).count();
    hits as f32 / query_terms.len() as f32
}
