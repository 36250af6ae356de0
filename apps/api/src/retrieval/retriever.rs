//! Retriever: embeds a document's chunks into a fresh index and answers
//! job-description queries with the most relevant chunk(s).
//!
//! Flow: embed_query → similarity search (k candidates) → optional rerank
//! (top_n survivors).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::document::splitter::Chunk;
use crate::pipeline::error::PipelineError;
use crate::retrieval::embedder::Embedder;
use crate::retrieval::index::{ScoredChunk, VectorIndex};
use crate::retrieval::reranker::Reranker;

pub const DEFAULT_TOP_N: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Upper bound on similarity candidates. `None` searches every chunk,
    /// which is what small resumes want.
    pub max_k: Option<usize>,
    /// Chunks kept after reranking.
    pub top_n: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            max_k: None,
            top_n: DEFAULT_TOP_N,
        }
    }
}

pub struct Retriever {
    index: VectorIndex,
    embedder: Arc<dyn Embedder>,
    reranker: Option<Arc<dyn Reranker>>,
    settings: RetrievalSettings,
}

impl Retriever {
    /// Embeds `chunks` and builds a new index owned by this retriever.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: Arc<dyn Embedder>,
        reranker: Option<Arc<dyn Reranker>>,
        settings: RetrievalSettings,
    ) -> Result<Self, PipelineError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;
        let index = VectorIndex::build(chunks, vectors)?;

        info!(
            "Index {} built: {} chunks embedded with '{}' ({} dimensions)",
            index.id(),
            index.len(),
            embedder.model_name(),
            index.dimension()
        );
        Ok(Self {
            index,
            embedder,
            reranker,
            settings,
        })
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Number of similarity candidates: the whole document unless bounded.
    pub fn k(&self) -> usize {
        let n = self.index.len();
        self.settings.max_k.map_or(n, |max| max.min(n))
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>, PipelineError> {
        let query_vector = self.embedder.embed_query(query).await?;
        let candidates = self.index.search(&query_vector, self.k())?;

        let Some(reranker) = &self.reranker else {
            return Ok(candidates);
        };

        let total = candidates.len();
        let reranked = reranker
            .rerank(query, candidates, self.settings.top_n)
            .await?;
        info!(
            "Retrieved {} of {} candidates from index {} ({} rerank)",
            reranked.len(),
            total,
            self.index.id(),
            reranker.name()
        );
        Ok(reranked)
    }
}
