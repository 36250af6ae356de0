// Document Loader: upload staging, PDF page extraction, token-bounded chunking.

pub mod loader;
pub mod splitter;
pub mod tokenizer;
