//! Cover letter pipeline: wires the stages together.
//!
//! Flow: load PDF → split into chunks → embed + index → retrieve against the
//! job description (similarity, then optional rerank) → render template →
//! generate. Indexing and generation are separate calls so one uploaded
//! resume can serve many job descriptions.
//!
//! Each stage's failure propagates unchanged to the caller; nothing is
//! retried or substituted here.

pub mod error;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::document::loader::{Document, DocumentLoader};
use crate::generation::chain::GenerationChain;
use crate::generation::review::{review_draft, DraftReview};
use crate::generation::template::DocumentVariant;
use crate::retrieval::embedder::Embedder;
use crate::retrieval::index::ScoredChunk;
use crate::retrieval::reranker::Reranker;
use crate::retrieval::retriever::{RetrievalSettings, Retriever};

use self::error::PipelineError;

/// A resume that has been split and indexed, ready for generation.
pub struct IndexedDocument {
    pub retriever: Retriever,
    pub page_count: usize,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedDraft {
    pub text: String,
    pub variant: DocumentVariant,
    pub review: DraftReview,
    /// The chunks that were stuffed into the prompt, in prompt order.
    pub context: Vec<ScoredChunk>,
}

pub struct CoverLetterPipeline {
    loader: DocumentLoader,
    embedder: Arc<dyn Embedder>,
    reranker: Option<Arc<dyn Reranker>>,
    retrieval: RetrievalSettings,
    chain: GenerationChain,
}

impl CoverLetterPipeline {
    pub fn new(
        loader: DocumentLoader,
        embedder: Arc<dyn Embedder>,
        reranker: Option<Arc<dyn Reranker>>,
        retrieval: RetrievalSettings,
        chain: GenerationChain,
    ) -> Self {
        Self {
            loader,
            embedder,
            reranker,
            retrieval,
            chain,
        }
    }

    /// Loads, splits and indexes `document` into a fresh per-document index.
    pub async fn index_document(
        &self,
        document: &Document,
    ) -> Result<IndexedDocument, PipelineError> {
        let chunks = self.loader.load_and_split(document).await?;
        let page_count = chunks.first().map_or(0, |c| c.total_pages);
        let chunk_count = chunks.len();

        let retriever = Retriever::build(
            chunks,
            self.embedder.clone(),
            self.reranker.clone(),
            self.retrieval,
        )
        .await?;

        info!(
            "Indexed '{}' ({}) into index {}: {} page(s), {} chunk(s)",
            document.file_name,
            document.id,
            retriever.index().id(),
            page_count,
            chunk_count
        );
        Ok(IndexedDocument {
            retriever,
            page_count,
            chunk_count,
        })
    }

    /// Retrieves context for `job_description` and generates one draft.
    pub async fn generate(
        &self,
        retriever: &Retriever,
        job_description: &str,
        variant: DocumentVariant,
    ) -> Result<GeneratedDraft, PipelineError> {
        let context = retriever.retrieve(job_description).await?;
        let text = self
            .chain
            .generate(&variant.template(), &context, job_description)
            .await?;
        let review = review_draft(&text, variant);
        if review.is_clean() {
            debug!("{} draft passed review", variant.label());
        }

        Ok(GeneratedDraft {
            text,
            variant,
            review,
            context,
        })
    }

    /// One-shot run: index `document`, then generate against it.
    pub async fn run(
        &self,
        document: &Document,
        job_description: &str,
        variant: DocumentVariant,
    ) -> Result<GeneratedDraft, PipelineError> {
        let indexed = self.index_document(document).await?;
        self.generate(&indexed.retriever, job_description, variant)
            .await
    }
}
