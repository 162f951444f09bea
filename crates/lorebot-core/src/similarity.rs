//! Cosine similarity over term-frequency vectors.

use std::collections::HashMap;

fn term_frequencies(text: &str) -> HashMap<String, u64> {
    let mut counts = HashMap::new();
    let lowered = text.to_lowercase();
    for token in lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
    {
        *counts.entry(token.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Cosine similarity of the two strings' term-frequency vectors, in `[0, 1]`.
///
/// Tokens are runs of word characters; nothing is dropped. An empty vocabulary
/// on either side scores 0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let fa = term_frequencies(a);
    let fb = term_frequencies(b);
    if fa.is_empty() || fb.is_empty() {
        return 0.0;
    }

    // Integer sums keep the score exact and symmetric.
    let dot: u64 = fa
        .iter()
        .map(|(term, count)| count * fb.get(term).copied().unwrap_or(0))
        .sum();
    let norm_a: u64 = fa.values().map(|c| c * c).sum();
    let norm_b: u64 = fb.values().map(|c| c * c).sum();

    let score = dot as f64 / (norm_a as f64 * norm_b as f64).sqrt();
    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_scores_one() {
        assert_eq!(similarity("who founded the community", "who founded the community"), 1.0);
        assert_eq!(similarity("peace peace love", "peace peace love"), 1.0);
    }

    #[test]
    fn symmetric() {
        let a = "What is the Ahmadiyya belief about Khilafat?";
        let b = "tell me about khilafat and the khalifa";
        assert_eq!(similarity(a, b), similarity(b, a));
    }

    #[test]
    fn empty_vocabulary_scores_zero() {
        assert_eq!(similarity("", "anything"), 0.0);
        assert_eq!(similarity("anything", ""), 0.0);
        assert_eq!(similarity("?!", "..."), 0.0);
    }

    #[test]
    fn disjoint_text_scores_zero() {
        assert_eq!(similarity("jihad", "kashmir"), 0.0);
    }

    #[test]
    fn case_and_punctuation_are_ignored() {
        assert_eq!(similarity("Khilafat?", "khilafat"), 1.0);
    }

    #[test]
    fn counts_weight_the_score() {
        // zebra x3, ox x9, emu x3, yak x1: 3 / sqrt(1 * (9 + 81 + 9 + 1)) = 0.3
        let b = format!("zebra zebra zebra {} {} yak", "ox ".repeat(9), "emu ".repeat(3));
        assert_eq!(similarity("zebra", &b), 0.3);
    }
}
