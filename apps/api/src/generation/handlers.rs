//! Axum route handlers for the Generation API.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::review::DraftReview;
use crate::generation::template::DocumentVariant;
use crate::retrieval::index::ScoredChunk;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub job_description: String,
    #[serde(default)]
    pub variant: DocumentVariant,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub text: String,
    pub variant: DocumentVariant,
    pub review: DraftReview,
    pub context: Vec<ScoredChunk>,
}

#[derive(Debug, Serialize)]
pub struct VariantInfo {
    pub key: &'static str,
    pub label: &'static str,
    pub min_words: usize,
    pub max_words: usize,
}

#[derive(Debug, Serialize)]
pub struct VariantsResponse {
    pub variants: Vec<VariantInfo>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/variants
pub async fn handle_list_variants() -> Json<VariantsResponse> {
    let variants = DocumentVariant::ALL
        .iter()
        .map(|v| {
            let (min_words, max_words) = v.requested_words();
            VariantInfo {
                key: v.key(),
                label: v.label(),
                min_words,
                max_words,
            }
        })
        .collect();
    Json(VariantsResponse { variants })
}

/// POST /api/v1/sessions/:id/generate
///
/// Retrieves the most relevant resume chunk(s) for the job description and
/// generates the requested variant. The draft is returned as produced, with a
/// non-blocking review attached.
pub async fn handle_generate(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    let job_description = request.job_description.trim();
    if job_description.is_empty() {
        return Err(AppError::Validation(
            "job_description cannot be empty".to_string(),
        ));
    }
    let max_chars = state.config.max_job_description_chars;
    if job_description.chars().count() > max_chars {
        return Err(AppError::Validation(format!(
            "job_description exceeds {max_chars} characters"
        )));
    }

    let session = state
        .sessions
        .get(session_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))?;

    let draft = state
        .pipeline
        .generate(&session.retriever, job_description, request.variant)
        .await?;

    Ok(Json(GenerateResponse {
        text: draft.text,
        variant: draft.variant,
        review: draft.review,
        context: draft.context,
    }))
}
