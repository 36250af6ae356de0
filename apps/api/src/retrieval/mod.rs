// Retrieval: embeddings, per-document vector index, reranking, retriever.
// All remote calls go through llm_client (rerank) or the embedder's own client.

pub mod embedder;
pub mod index;
pub mod reranker;
pub mod retriever;
