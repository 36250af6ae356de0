use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::CoverLetterPipeline;
use crate::session::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Loader, embedder, optional reranker and generation chain.
    pub pipeline: Arc<CoverLetterPipeline>,
    /// One indexed resume per session. Idle sessions expire after `config.session_ttl`.
    pub sessions: Arc<SessionStore>,
}
