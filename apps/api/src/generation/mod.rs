// Generation: prompt templates per document variant, the generation chain,
// draft review and the HTTP handlers.
// All model calls go through llm_client via the TextGenerator trait.

pub mod chain;
pub mod handlers;
pub mod prompts;
pub mod review;
pub mod template;
