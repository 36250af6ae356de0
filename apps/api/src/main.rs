mod config;
mod document;
mod errors;
mod generation;
mod llm_client;
mod pipeline;
mod retrieval;
mod routes;
mod session;
mod state;
#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, RerankerKind};
use crate::document::loader::{DocumentLoader, PdfPageExtractor};
use crate::document::splitter::TextSplitter;
use crate::document::tokenizer::{load_token_counter, TokenCounter};
use crate::generation::chain::GenerationChain;
use crate::llm_client::LlmClient;
use crate::pipeline::CoverLetterPipeline;
use crate::retrieval::embedder::{Embedder, LazyEmbedder};
use crate::retrieval::reranker::{CohereReranker, LexicalReranker, Reranker};
use crate::routes::build_router;
use crate::session::{spawn_sweeper, SessionStore};
use crate::state::AppState;

const SWEEP_PERIOD: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Cover Me API v{}", env!("CARGO_PKG_VERSION"));

    // Tokenizer may download from the hub; keep it off the runtime threads.
    let tokenizer_spec = config.tokenizer.clone();
    let token_counter = tokio::task::spawn_blocking(move || load_token_counter(&tokenizer_spec))
        .await
        .context("Tokenizer loading task failed")??;
    info!("Token counter initialized ({})", token_counter.name());

    let splitter = TextSplitter::new(config.chunk_policy(), token_counter)?;
    let loader = DocumentLoader::new(Arc::new(PdfPageExtractor), splitter);
    info!("Chunk policy: {:?}", loader.splitter().policy());

    // Initialize LLM client (chat + rerank)
    let llm = LlmClient::new(config.llm_client_config())?;
    info!("LLM client initialized (rerank model: {})", llm.rerank_model());

    // Embedder connects on first use and is shared by every session
    let embedder: Arc<dyn Embedder> = Arc::new(LazyEmbedder::new(config.embedding_config()));
    info!("Embedding model: {}", embedder.model_name());

    let reranker: Option<Arc<dyn Reranker>> = match config.reranker {
        RerankerKind::Cohere => Some(Arc::new(CohereReranker::new(llm.clone()))),
        RerankerKind::Lexical => Some(Arc::new(LexicalReranker)),
        RerankerKind::None => None,
    };
    info!(
        "Reranker: {}",
        reranker.as_ref().map_or("none", |r| r.name())
    );

    let chain = GenerationChain::new(Arc::new(llm));
    info!("Generation model: {}", chain.model_name());

    let pipeline = CoverLetterPipeline::new(
        loader,
        embedder,
        reranker,
        config.retrieval_settings(),
        chain,
    );

    let sessions = Arc::new(SessionStore::new(config.session_ttl));
    spawn_sweeper(sessions.clone(), SWEEP_PERIOD);

    // Build app state
    let state = AppState {
        config: config.clone(),
        pipeline: Arc::new(pipeline),
        sessions,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
