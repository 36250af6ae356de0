use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::pipeline::error::PipelineError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg.clone())
            }
            AppError::Pipeline(e) => pipeline_parts(e),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        }
    }
}

fn pipeline_parts(e: &PipelineError) -> (StatusCode, &'static str, String) {
    if e.is_external() {
        tracing::error!("External service error: {e}");
        let (code, service) = match e {
            PipelineError::EmbeddingUnavailable(_) => ("EMBEDDING_UNAVAILABLE", "embedding"),
            PipelineError::RerankUnavailable(_) => ("RERANK_UNAVAILABLE", "reranking"),
            _ => ("GENERATION_UNAVAILABLE", "generation"),
        };
        return (
            StatusCode::BAD_GATEWAY,
            code,
            format!("The {service} service could not be reached"),
        );
    }

    match e {
        PipelineError::UnreadableDocument(msg) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "UNREADABLE_DOCUMENT",
            msg.clone(),
        ),
        _ => {
            tracing::error!("Pipeline error: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PIPELINE_ERROR",
                e.to_string(),
            )
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::PayloadTooLarge("x".into()), StatusCode::PAYLOAD_TOO_LARGE),
            (
                PipelineError::UnreadableDocument("x".into()).into(),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                PipelineError::GenerationUnavailable("x".into()).into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                PipelineError::EmbeddingUnavailable("x".into()).into(),
                StatusCode::BAD_GATEWAY,
            ),
            (PipelineError::EmptyContext.into(), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_external_failure_details_are_not_leaked() {
        let error: AppError =
            PipelineError::GenerationUnavailable("api key sk-123 rejected".into()).into();
        let (_, code, message) = error.parts();
        assert_eq!(code, "GENERATION_UNAVAILABLE");
        assert!(!message.contains("sk-123"));
    }
}
