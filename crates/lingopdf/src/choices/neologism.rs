//! Neologism tagging: finding candidate terms that deserve user-steered
//! translation.
//!
//! The interface is the contract; the shipped implementation is a
//! single-pass heuristic. Taggers are pure functions of their inputs and
//! hold no global state.

use super::context::TranslationContext;

/// A candidate term found in a text.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedTerm {
    /// Byte range of the term within the input text.
    pub span: (usize, usize),
    pub term: String,
    /// Detection confidence in 0–1.
    pub confidence: f64,
    pub context: TranslationContext,
}

/// Identifies candidate terms and attaches context metadata.
pub trait NeologismTagger: Send + Sync {
    fn tag(&self, text: &str, locale: &str) -> Vec<TaggedTerm>;
}

/// Words this long are flagged as rare-term candidates.
const LONG_TOKEN_CHARS: usize = 12;
/// How many neighbors on each side feed `surrounding_terms`.
const NEIGHBOR_WINDOW: usize = 3;

/// Single-pass heuristic tagger: long rare tokens, hyphenated compounds,
/// and capitalized words in sentence-interior position.
#[derive(Debug, Clone, Default)]
pub struct HeuristicTagger;

impl NeologismTagger for HeuristicTagger {
    fn tag(&self, text: &str, locale: &str) -> Vec<TaggedTerm> {
        let words = tokenize(text);
        let mut tagged = Vec::new();

        for (index, token) in words.iter().enumerate() {
            let Some(confidence) = classify(token, index == 0) else {
                continue;
            };

            let surrounding = words
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index && index.abs_diff(*i) <= NEIGHBOR_WINDOW)
                .map(|(_, w)| w.stripped.to_string())
                .collect();

            tagged.push(TaggedTerm {
                span: (token.start, token.start + token.stripped.len()),
                term: token.stripped.to_string(),
                confidence,
                context: TranslationContext {
                    sentence_context: text.to_string(),
                    source_language: locale.to_string(),
                    surrounding_terms: surrounding,
                    confidence_score: confidence,
                    ..Default::default()
                },
            });
        }

        tagged
    }
}

struct Token<'a> {
    /// Byte offset of the stripped token within the input.
    start: usize,
    /// Token without leading/trailing punctuation.
    stripped: &'a str,
    /// A sentence terminator preceded this token.
    follows_terminator: bool,
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut follows_terminator = true;

    for (offset, raw) in text.split_whitespace().map(|w| {
        let offset = w.as_ptr() as usize - text.as_ptr() as usize;
        (offset, w)
    }) {
        let stripped = raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '-');
        if stripped.is_empty() {
            follows_terminator = raw.ends_with(['.', '!', '?', ':']);
            continue;
        }
        let start = offset + (raw.len() - raw.trim_start_matches(|c: char| !c.is_alphanumeric() && c != '-').len());

        tokens.push(Token {
            start,
            stripped,
            follows_terminator,
        });
        follows_terminator = raw.ends_with(['.', '!', '?', ':']);
    }
    tokens
}

/// Classification rules; `None` means the token is ordinary.
fn classify(token: &Token<'_>, is_first: bool) -> Option<f64> {
    let word = token.stripped;
    let chars = word.chars().count();
    if chars < 4 {
        return None;
    }

    // Hyphenated compound with substantial halves.
    if let Some((left, right)) = word.split_once('-')
        && left.chars().count() >= 3
        && right.chars().count() >= 3
    {
        return Some(0.6);
    }

    // Long rare token.
    if chars >= LONG_TOKEN_CHARS {
        return Some(0.5);
    }

    // Capitalized in sentence-interior position.
    let starts_upper = word.chars().next().is_some_and(char::is_uppercase);
    if starts_upper && !is_first && !token.follows_terminator {
        return Some(0.55);
    }

    None
}
