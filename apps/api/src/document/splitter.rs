//! Separator-based splitter bounded by token count.
//!
//! Text is cut on a separator (a blank line by default), then the pieces are
//! greedily merged back into windows whose joined text stays within
//! `max_tokens`. A piece that is larger than the limit on its
//! own is never cut further and becomes a chunk by itself.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::document::tokenizer::TokenCounter;
use crate::pipeline::error::PipelineError;

pub const DEFAULT_SEPARATOR: &str = "\n\n";
pub const DEFAULT_CHUNK_SIZE: usize = 200;
pub const DEFAULT_CHUNK_OVERLAP: usize = 0;

/// Token threshold and overlap controlling how extracted text is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPolicy {
    pub max_tokens: usize,
    pub overlap: usize,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkPolicy {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_tokens == 0 {
            return Err(PipelineError::InvalidPolicy(
                "chunk size must be greater than 0".to_string(),
            ));
        }
        if self.overlap > self.max_tokens {
            return Err(PipelineError::InvalidPolicy(format!(
                "chunk overlap ({}) is larger than chunk size ({})",
                self.overlap, self.max_tokens
            )));
        }
        Ok(())
    }
}

/// Text of one page as handed over by the loader.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    /// 0-based page number, `None` when the extractor could not separate pages.
    pub page: Option<usize>,
    pub total_pages: usize,
    pub text: String,
}

/// A contiguous span of extracted text. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Ordinal within the source document (traceability only).
    pub index: usize,
    pub text: String,
    pub page: Option<usize>,
    pub total_pages: usize,
    pub token_count: usize,
}

pub struct TextSplitter {
    policy: ChunkPolicy,
    separator: String,
    counter: Arc<dyn TokenCounter>,
}

impl TextSplitter {
    pub fn new(policy: ChunkPolicy, counter: Arc<dyn TokenCounter>) -> Result<Self, PipelineError> {
        policy.validate()?;
        Ok(Self {
            policy,
            separator: DEFAULT_SEPARATOR.to_string(),
            counter,
        })
    }

    pub fn policy(&self) -> ChunkPolicy {
        self.policy
    }

    /// Splits every page independently and numbers the resulting chunks in
    /// document order.
    pub fn split_pages(&self, pages: &[PageText]) -> Result<Vec<Chunk>, PipelineError> {
        let mut chunks = Vec::new();
        for page in pages {
            for text in self.split_text(&page.text)? {
                let token_count = self.counter.count(&text)?;
                if token_count > self.policy.max_tokens {
                    warn!(
                        "Created a chunk of {} tokens, which is longer than the limit of {} (page {:?})",
                        token_count, self.policy.max_tokens, page.page
                    );
                }
                chunks.push(Chunk {
                    index: chunks.len(),
                    text,
                    page: page.page,
                    total_pages: page.total_pages,
                    token_count,
                });
            }
        }
        Ok(chunks)
    }

    pub fn split_text(&self, text: &str) -> Result<Vec<String>, PipelineError> {
        let pieces: Vec<&str> = if self.separator.is_empty() {
            vec![text]
        } else {
            text.split(self.separator.as_str()).collect()
        };
        let pieces: Vec<&str> = pieces.into_iter().filter(|p| !p.is_empty()).collect();
        self.merge_pieces(&pieces)
    }

    fn merge_pieces(&self, pieces: &[&str]) -> Result<Vec<String>, PipelineError> {
        let max = self.policy.max_tokens;
        let overlap = self.policy.overlap;

        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();

        for &piece in pieces {
            if !window.is_empty() && self.measure(window.iter().copied().chain([piece]))? > max {
                if let Some(chunk) = self.join(window.iter().copied()) {
                    chunks.push(chunk);
                }
                // Shrink from the front until only the overlap remains and
                // the incoming piece fits.
                while !window.is_empty() {
                    let kept = self.measure(window.iter().copied())?;
                    let with_piece = self.measure(window.iter().copied().chain([piece]))?;
                    if kept <= overlap && with_piece <= max {
                        break;
                    }
                    window.pop_front();
                }
            }
            window.push_back(piece);
        }

        if let Some(chunk) = self.join(window.iter().copied()) {
            chunks.push(chunk);
        }
        Ok(chunks)
    }

    fn join<'a>(&self, pieces: impl Iterator<Item = &'a str>) -> Option<String> {
        let joined = pieces.collect::<Vec<_>>().join(&self.separator);
        let trimmed = joined.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Token count of the pieces as they would be emitted. Counted on the
    /// joined text: tokenizers such as GPT-2 do not count a separator the
    /// same on its own as between two words.
    fn measure<'a>(&self, pieces: impl Iterator<Item = &'a str>) -> Result<usize, PipelineError> {
        match self.join(pieces) {
            Some(text) => self.counter.count(&text),
            None => Ok(0),
        }
    }
}
