//! Draft review: checks a generated draft against the format its template
//! asked for. Findings are reported and logged; the draft is never altered
//! or rejected because of them.

use serde::Serialize;
use tracing::warn;

use crate::generation::template::DocumentVariant;

const GREETINGS: &[&str] = &["dear", "hi", "hello", "greetings"];
const SIGN_OFFS: &[&str] = &[
    "best regards",
    "kind regards",
    "warm regards",
    "regards",
    "sincerely",
    "best",
    "thank you",
    "thanks",
];
const FORBIDDEN_PHRASES: &[&str] = &["job description"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftReview {
    pub body_word_count: usize,
    pub requested_words: (usize, usize),
    pub opens_with_greeting: bool,
    pub closes_with_name: bool,
    pub mentions_forbidden_phrase: bool,
    /// Human-readable problems, empty when the draft looks as requested.
    pub findings: Vec<String>,
}

impl DraftReview {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

pub fn review_draft(text: &str, variant: DocumentVariant) -> DraftReview {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let opens_with_greeting = lines.first().is_some_and(|l| is_greeting(l));
    let closes_with_name = lines.len() > 1 && lines.last().is_some_and(|l| is_name_line(l));

    // Body: everything between the greeting and the sign-off/name lines.
    let start = usize::from(opens_with_greeting);
    let mut end = lines.len();
    if closes_with_name {
        end -= 1;
    }
    if end > start && is_sign_off(lines[end - 1]) {
        end -= 1;
    }
    let body_word_count: usize = lines
        .get(start..end)
        .unwrap_or_default()
        .iter()
        .map(|l| l.split_whitespace().count())
        .sum();

    let lowered = text.to_lowercase();
    let mentions_forbidden_phrase = FORBIDDEN_PHRASES.iter().any(|p| lowered.contains(p));

    let requested_words = variant.requested_words();
    let (min, max) = requested_words;

    let mut findings = Vec::new();
    if !opens_with_greeting {
        findings.push("draft does not open with a greeting".to_string());
    }
    if !closes_with_name {
        findings.push("last line is not a bare name".to_string());
    }
    if body_word_count < min || body_word_count > max {
        findings.push(format!(
            "body has {body_word_count} words, requested {min}-{max}"
        ));
    }
    if mentions_forbidden_phrase {
        findings.push("draft refers to the job description explicitly".to_string());
    }

    let review = DraftReview {
        body_word_count,
        requested_words,
        opens_with_greeting,
        closes_with_name,
        mentions_forbidden_phrase,
        findings,
    };

    for finding in &review.findings {
        warn!("{} draft review: {}", variant.label(), finding);
    }
    review
}

fn is_greeting(line: &str) -> bool {
    let first = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    GREETINGS.contains(&first.as_str())
}

fn is_sign_off(line: &str) -> bool {
    let normalized = line
        .trim_end_matches(|c: char| c == ',' || c == '.' || c == '!')
        .to_lowercase();
    SIGN_OFFS.contains(&normalized.as_str())
}

/// One to four capitalised words with no sentence punctuation.
fn is_name_line(line: &str) -> bool {
    if is_sign_off(line) || line.contains([',', ':', ';', '!', '?']) {
        return false;
    }
    let words: Vec<&str> = line.split_whitespace().collect();
    (1..=4).contains(&words.len())
        && words
            .iter()
            .all(|w| w.chars().next().is_some_and(char::is_uppercase))
}
