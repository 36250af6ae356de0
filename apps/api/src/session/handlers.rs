//! Axum route handlers for the Session API.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::document::loader::Document;
use crate::errors::AppError;
use crate::session::Session;
use crate::state::AppState;

const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub file_name: String,
    pub page_count: usize,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

/// POST /api/v1/sessions
///
/// Accepts a PDF resume in the multipart field `file`, indexes it, and opens a
/// session that owns the index.
pub async fn handle_create_session(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("resume.pdf").to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some(Document::new(file_name, bytes));
        break;
    }

    let document = upload.ok_or_else(|| {
        AppError::Validation(format!("multipart field '{FILE_FIELD}' is required"))
    })?;
    if document.bytes.is_empty() {
        return Err(AppError::Validation("uploaded file is empty".to_string()));
    }

    let indexed = state.pipeline.index_document(&document).await?;
    let session = state
        .sessions
        .insert(Session {
            id: Uuid::new_v4(),
            file_name: document.file_name.clone(),
            page_count: indexed.page_count,
            chunk_count: indexed.chunk_count,
            created_at: Utc::now(),
            retriever: indexed.retriever,
        })
        .await;

    info!("Session {} opened for '{}'", session.id, session.file_name);
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            session_id: session.id,
            file_name: session.file_name.clone(),
            page_count: session.page_count,
            chunk_count: session.chunk_count,
            created_at: session.created_at,
        }),
    ))
}

/// DELETE /api/v1/sessions/:id
///
/// Discards the session and its index.
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.sessions.remove(session_id).await {
        return Err(AppError::NotFound(format!("Session {session_id} not found")));
    }
    info!("Session {session_id} closed");
    Ok(StatusCode::NO_CONTENT)
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(e.body_text())
    }
}
