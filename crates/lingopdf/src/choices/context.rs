//! Translation context: the semantic neighborhood of a term occurrence.
//!
//! Two operations matter here: a stable fingerprint (`context_hash`) used
//! as an equality key, and a weighted similarity score used for
//! nearest-context lookups and conflict detection.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Similarity weights; they sum to 1.0.
const WEIGHT_SEMANTIC_FIELD: f64 = 0.25;
const WEIGHT_PHILOSOPHICAL_DOMAIN: f64 = 0.20;
const WEIGHT_AUTHOR: f64 = 0.15;
const WEIGHT_SURROUNDING_TERMS: f64 = 0.15;
const WEIGHT_RELATED_CONCEPTS: f64 = 0.10;
const WEIGHT_SOURCE_LANGUAGE: f64 = 0.075;
const WEIGHT_TARGET_LANGUAGE: f64 = 0.075;

/// The context a term was seen in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslationContext {
    #[serde(default)]
    pub sentence_context: String,
    #[serde(default)]
    pub paragraph_context: String,
    #[serde(default)]
    pub semantic_field: String,
    #[serde(default)]
    pub philosophical_domain: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub source_language: String,
    #[serde(default)]
    pub target_language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<usize>,
    #[serde(default)]
    pub surrounding_terms: Vec<String>,
    #[serde(default)]
    pub related_concepts: Vec<String>,
    #[serde(default)]
    pub confidence_score: f64,
}

impl TranslationContext {
    /// Stable 256-bit fingerprint over the semantic fields, hex-encoded.
    ///
    /// Sentence/paragraph excerpts, page numbers, and confidence do not
    /// participate: contexts that differ only in where the term appeared
    /// on the page hash identically.
    pub fn context_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [
            &self.semantic_field,
            &self.philosophical_domain,
            &self.author,
            &self.source_language,
            &self.target_language,
        ] {
            hasher.update(canonical(field).as_bytes());
            hasher.update([0u8]);
        }
        for set in [&self.surrounding_terms, &self.related_concepts] {
            let mut sorted: Vec<String> = set.iter().map(|s| canonical(s)).collect();
            sorted.sort();
            sorted.dedup();
            for entry in sorted {
                hasher.update(entry.as_bytes());
                hasher.update([1u8]);
            }
            hasher.update([2u8]);
        }
        hex::encode(hasher.finalize())
    }

    /// Weighted similarity in 0–1; 0.8 and above counts as "similar".
    pub fn similarity(&self, other: &Self) -> f64 {
        let score = WEIGHT_SEMANTIC_FIELD * scalar_match(&self.semantic_field, &other.semantic_field)
            + WEIGHT_PHILOSOPHICAL_DOMAIN
                * scalar_match(&self.philosophical_domain, &other.philosophical_domain)
            + WEIGHT_AUTHOR * scalar_match(&self.author, &other.author)
            + WEIGHT_SURROUNDING_TERMS * jaccard(&self.surrounding_terms, &other.surrounding_terms)
            + WEIGHT_RELATED_CONCEPTS * jaccard(&self.related_concepts, &other.related_concepts)
            + WEIGHT_SOURCE_LANGUAGE * scalar_match(&self.source_language, &other.source_language)
            + WEIGHT_TARGET_LANGUAGE * scalar_match(&self.target_language, &other.target_language);
        score.clamp(0.0, 1.0)
    }
}

fn canonical(s: &str) -> String {
    s.trim().to_lowercase()
}

fn scalar_match(a: &str, b: &str) -> f64 {
    if canonical(a) == canonical(b) { 1.0 } else { 0.0 }
}

/// Jaccard index over canonicalized sets; two empty sets count as equal.
fn jaccard(a: &[String], b: &[String]) -> f64 {
    let set_a: HashSet<String> = a.iter().map(|s| canonical(s)).collect();
    let set_b: HashSet<String> = b.iter().map(|s| canonical(s)).collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}
