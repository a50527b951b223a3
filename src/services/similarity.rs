use std::collections::HashMap;

use crate::services::provider::{ProviderError, TextSimilarity};

/// Trim and collapse internal whitespace so equal texts produce equal keys
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Join two text fragments and normalize the result
pub fn combine_text(first: &str, second: &str) -> String {
    normalize_text(&format!("{} {}", first, second))
}

/// Term-frequency cosine similarity
///
/// A lexical stand-in for an embedding model: deterministic, symmetric, and
/// bounded in [0, 1] because term counts are non-negative.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalCosine;

impl LexicalCosine {
    fn term_frequencies(text: &str) -> HashMap<String, f64> {
        let mut counts = HashMap::new();
        for token in text.split_whitespace() {
            let term: String = token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if !term.is_empty() {
                *counts.entry(term).or_insert(0.0) += 1.0;
            }
        }
        counts
    }
}

impl TextSimilarity for LexicalCosine {
    fn similarity(&self, text_a: &str, text_b: &str) -> Result<f64, ProviderError> {
        let a = Self::term_frequencies(text_a);
        let b = Self::term_frequencies(text_b);
        if a.is_empty() || b.is_empty() {
            return Ok(0.0);
        }

        let dot: f64 = a
            .iter()
            .filter_map(|(term, count)| b.get(term).map(|other| count * other))
            .sum();
        let norm_a = a.values().map(|v| v * v).sum::<f64>().sqrt();
        let norm_b = b.values().map(|v| v * v).sum::<f64>().sqrt();

        Ok((dot / (norm_a * norm_b)).clamp(0.0, 1.0))
    }
}
