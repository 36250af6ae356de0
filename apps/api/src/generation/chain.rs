//! Generation chain: stuff retrieved chunks into a template's `{context}`
//! slot, the job description into `{input}`, and ask the model once.
//!
//! The reply is returned exactly as produced. Format constraints in the
//! templates are requests, not guarantees.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::generation::template::{PromptInstance, PromptTemplate};
use crate::llm_client::LlmClient;
use crate::pipeline::error::PipelineError;
use crate::retrieval::index::ScoredChunk;

/// Separator between stuffed context chunks.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, prompt: &PromptInstance) -> Result<String, PipelineError>;
}

#[async_trait]
impl TextGenerator for LlmClient {
    fn model_name(&self) -> &str {
        self.chat_model()
    }

    async fn complete(&self, prompt: &PromptInstance) -> Result<String, PipelineError> {
        self.chat(prompt.as_str())
            .await
            .map_err(|e| PipelineError::GenerationUnavailable(e.to_string()))
    }
}

#[derive(Clone)]
pub struct GenerationChain {
    generator: Arc<dyn TextGenerator>,
}

impl GenerationChain {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    /// Chunk texts in retrieval order, joined by a blank line.
    pub fn stuff_context(retrieved: &[ScoredChunk]) -> String {
        retrieved
            .iter()
            .map(|c| c.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR)
    }

    pub async fn generate(
        &self,
        template: &PromptTemplate,
        retrieved: &[ScoredChunk],
        input: &str,
    ) -> Result<String, PipelineError> {
        if retrieved.is_empty() {
            return Err(PipelineError::EmptyContext);
        }

        let prompt = template.render(&Self::stuff_context(retrieved), input);
        let text = self.generator.complete(&prompt).await?;

        info!(
            "Generated '{}' with {} from {} context chunk(s): {} chars",
            template.name(),
            self.generator.model_name(),
            retrieved.len(),
            text.len()
        );
        Ok(text)
    }
}
