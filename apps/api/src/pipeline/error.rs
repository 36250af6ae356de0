use thiserror::Error;

/// Failures surfaced by the cover letter pipeline.
///
/// Every variant propagates to the immediate caller uninterpreted; the HTTP
/// layer (`AppError`) decides how each one is presented.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The upload could not be parsed or yielded no extractable text.
    #[error("Unreadable document: {0}")]
    UnreadableDocument(String),

    /// Chunk sizing is misconfigured. Not recoverable by the user.
    #[error("Invalid chunk policy: {0}")]
    InvalidPolicy(String),

    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Rerank service unavailable: {0}")]
    RerankUnavailable(String),

    #[error("Generation service unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("Index is empty: build it from a document before searching")]
    EmptyIndex,

    #[error("No context was retrieved: refusing to render an empty-context prompt")]
    EmptyContext,

    /// Chunks and vectors did not line up when building an index.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
}

impl PipelineError {
    /// True when the failure came from a remote capability rather than from
    /// the document or the pipeline's own sequencing.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            PipelineError::EmbeddingUnavailable(_)
                | PipelineError::RerankUnavailable(_)
                | PipelineError::GenerationUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_failures_are_flagged() {
        assert!(PipelineError::GenerationUnavailable("timeout".into()).is_external());
        assert!(PipelineError::EmbeddingUnavailable("dns".into()).is_external());
        assert!(PipelineError::RerankUnavailable("401".into()).is_external());
        assert!(!PipelineError::EmptyContext.is_external());
        assert!(!PipelineError::UnreadableDocument("corrupt".into()).is_external());
    }

    #[test]
    fn test_display_carries_detail() {
        let err = PipelineError::InvalidPolicy("chunk size must be greater than 0".into());
        assert_eq!(
            err.to_string(),
            "Invalid chunk policy: chunk size must be greater than 0"
        );
    }
}
