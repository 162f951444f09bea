//! Free-text term extraction used for topic guesses and search context.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

pub const MAX_SEARCH_TERMS: usize = 5;

const PUNCTUATION: &[char] = &['?', '.', ',', '!', '\'', '"', ';', ':', '/', '\\'];

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for", "with", "about", "of",
    "by", "from", "as", "into", "through", "during", "after", "before", "above", "below",
    "since", "yes", "no", "not", "please", "tell", "me", "i", "we", "you", "they", "he", "she",
    "it", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be", "being",
    "been", "have", "has", "had", "do", "does", "did", "will", "would", "shall", "should", "may",
    "might", "must", "can", "could",
];

/// Negations carry meaning when searching, so search keeps them.
const SEARCH_KEEPS: &[&str] = &["yes", "no", "not"];

fn lead_phrases() -> &'static Regex {
    static LEAD: OnceLock<Regex> = OnceLock::new();
    LEAD.get_or_init(|| {
        Regex::new(
            r"\b(?:what (?:do|does) \w+ (?:believe|say|teach) about|what is|who is|tell me about|can you explain|how|why|when|where)\b",
        )
        .expect("lead phrase pattern is valid")
    })
}

fn stop_words() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

fn search_stop_words() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| {
        STOP_WORDS
            .iter()
            .copied()
            .filter(|w| !SEARCH_KEEPS.contains(w))
            .collect()
    })
}

fn clean(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = lead_phrases().replace_all(&lowered, " ");
    stripped.replace(PUNCTUATION, "")
}

fn terms_with(text: &str, stop: &HashSet<&str>) -> Vec<String> {
    clean(text)
        .split_whitespace()
        .filter(|t| t.chars().count() > 2 && !stop.contains(t))
        .map(str::to_string)
        .collect()
}

/// Lower-cased content terms in their original order.
pub fn extract_terms(text: &str) -> Vec<String> {
    terms_with(text, stop_words())
}

/// Longest surviving term; the first one wins a tie.
pub fn extract_topic(text: &str) -> Option<String> {
    let mut best: Option<String> = None;
    for term in extract_terms(text) {
        let longer = best
            .as_ref()
            .map_or(true, |b| term.chars().count() > b.chars().count());
        if longer {
            best = Some(term);
        }
    }
    best
}

pub fn get_search_terms(text: &str) -> Vec<String> {
    let mut terms = terms_with(text, search_stop_words());
    terms.truncate(MAX_SEARCH_TERMS);
    terms
}
