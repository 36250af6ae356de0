//! Document variants and their prompt templates.
//!
//! A template has exactly two slots, `{context}` and `{input}`. Rendering is
//! a single left-to-right pass: substituted values are copied verbatim and
//! never re-scanned, so a resume or job posting that itself contains
//! `{input}` cannot inject into the other slot.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::generation::prompts::{COVER_LETTER_TEMPLATE, LINKEDIN_MESSAGE_TEMPLATE};

const CONTEXT_SLOT: &str = "{context}";
const INPUT_SLOT: &str = "{input}";

// ────────────────────────────────────────────────────────────────────────────
// DocumentVariant
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum DocumentVariant {
    #[default]
    CoverLetter,
    LinkedinMessage,
}

impl DocumentVariant {
    pub const ALL: [DocumentVariant; 2] = [Self::CoverLetter, Self::LinkedinMessage];

    /// Stable identifier used on the wire.
    pub fn key(&self) -> &'static str {
        match self {
            Self::CoverLetter => "cover_letter",
            Self::LinkedinMessage => "linkedin_message",
        }
    }

    /// Human-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CoverLetter => "Cover Letter",
            Self::LinkedinMessage => "LinkedIn Message",
        }
    }

    pub fn template(&self) -> PromptTemplate {
        match self {
            Self::CoverLetter => PromptTemplate::new("cover_letter", COVER_LETTER_TEMPLATE),
            Self::LinkedinMessage => {
                PromptTemplate::new("linkedin_message", LINKEDIN_MESSAGE_TEMPLATE)
            }
        }
    }

    /// Body length the template asks for, in words (inclusive).
    pub fn requested_words(&self) -> (usize, usize) {
        match self {
            Self::CoverLetter => (150, 250),
            Self::LinkedinMessage => (50, 150),
        }
    }
}

impl fmt::Display for DocumentVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown document variant '{0}' (expected one of: cover_letter, linkedin_message)")]
pub struct UnknownVariant(pub String);

impl FromStr for DocumentVariant {
    type Err = UnknownVariant;

    /// Accepts keys and labels in any case, with spaces, dashes or
    /// underscores between words ("Cover Letter", "cover-letter").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        match normalized.as_str() {
            "cover_letter" => Ok(Self::CoverLetter),
            "linkedin_message" | "linked_in_message" => Ok(Self::LinkedinMessage),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

impl TryFrom<String> for DocumentVariant {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PromptTemplate
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    name: &'static str,
    text: &'static str,
}

impl PromptTemplate {
    pub const fn new(name: &'static str, text: &'static str) -> Self {
        Self { name, text }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn text(&self) -> &'static str {
        self.text
    }

    pub fn render(&self, context: &str, input: &str) -> PromptInstance {
        let mut out = String::with_capacity(self.text.len() + context.len() + input.len());
        let mut rest = self.text;

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            if let Some(after) = tail.strip_prefix(CONTEXT_SLOT) {
                out.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(INPUT_SLOT) {
                out.push_str(input);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);

        PromptInstance(out)
    }
}

/// A fully rendered prompt, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptInstance(String);

impl PromptInstance {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PromptInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
