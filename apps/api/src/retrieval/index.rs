//! Vector Index: an in-memory (chunk, vector) collection scoped to one
//! document, searched by brute-force cosine similarity.
//!
//! Each index gets its own id; indexes are never shared or merged across
//! documents and die with the session that built them.

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::document::splitter::Chunk;
use crate::pipeline::error::PipelineError;

/// A chunk with its relevance to a query. Higher is more relevant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    id: Uuid,
    dimension: usize,
    entries: Vec<(Chunk, Vec<f32>)>,
}

impl VectorIndex {
    /// Pairs `chunks` with `vectors` one-to-one. All vectors must share one
    /// non-zero dimensionality.
    pub fn build(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self, PipelineError> {
        if chunks.len() != vectors.len() {
            return Err(PipelineError::DimensionMismatch(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        if !vectors.is_empty() && dimension == 0 {
            return Err(PipelineError::DimensionMismatch(
                "vectors have zero dimensions".to_string(),
            ));
        }
        if let Some(bad) = vectors.iter().position(|v| v.len() != dimension) {
            return Err(PipelineError::DimensionMismatch(format!(
                "vector {bad} has {} dimensions, expected {dimension}",
                vectors[bad].len()
            )));
        }

        let index = Self {
            id: Uuid::new_v4(),
            dimension,
            entries: chunks.into_iter().zip(vectors).collect(),
        };
        debug!(
            "Built index {} with {} entries ({} dimensions)",
            index.id,
            index.len(),
            dimension
        );
        Ok(index)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns up to `k` chunks ranked by cosine similarity, highest first.
    /// Ties keep document order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, PipelineError> {
        if self.is_empty() {
            return Err(PipelineError::EmptyIndex);
        }
        if query.len() != self.dimension {
            return Err(PipelineError::DimensionMismatch(format!(
                "query has {} dimensions, index {} has {}",
                query.len(),
                self.id,
                self.dimension
            )));
        }

        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|(chunk, vector)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(query, vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk.index.cmp(&b.chunk.index))
        });
        scored.truncate(k);
        Ok(scored)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
