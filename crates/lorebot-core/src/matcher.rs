//! Knowledge matching.
//!
//! A query resolves in two passes over the entry set, which must be in
//! insertion order:
//!
//! 1. Direct pass: the first entry with a tag or topic contained in the query
//!    (case-insensitive) wins outright.
//! 2. Similarity pass: the entry whose question scores highest against the
//!    query wins if it reaches the threshold. Ties keep the earlier entry.

use lorebot_schema::KnowledgeEntry;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::similarity::similarity;

/// Empirical cutoff for the similarity pass.
pub const DEFAULT_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Tag,
    Topic,
    Similarity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub entry: KnowledgeEntry,
    /// 1.0 for direct matches, the cosine score otherwise
    pub score: f64,
    pub kind: MatchKind,
}

pub fn find_relevant_knowledge(
    query: &str,
    entries: &[KnowledgeEntry],
    threshold: f64,
) -> Option<MatchResult> {
    if let Some((entry, kind)) = direct_match(query, entries) {
        return Some(MatchResult {
            entry: entry.clone(),
            score: 1.0,
            kind,
        });
    }

    let (entry, score) = best_similarity(query, entries)?;
    if score >= threshold {
        Some(MatchResult {
            entry: entry.clone(),
            score,
            kind: MatchKind::Similarity,
        })
    } else {
        None
    }
}

/// Blank tags and topics never match.
pub fn direct_match<'a>(
    query: &str,
    entries: &'a [KnowledgeEntry],
) -> Option<(&'a KnowledgeEntry, MatchKind)> {
    let query = query.to_lowercase();
    let contains = |needle: &str| {
        let needle = needle.trim();
        !needle.is_empty() && query.contains(&needle.to_lowercase())
    };

    entries.iter().find_map(|entry| {
        if entry.tags.iter().any(|tag| contains(tag)) {
            Some((entry, MatchKind::Tag))
        } else if contains(&entry.topic) {
            Some((entry, MatchKind::Topic))
        } else {
            None
        }
    })
}

/// Highest-scoring entry by question similarity, earliest on ties.
pub fn best_similarity<'a>(
    query: &str,
    entries: &'a [KnowledgeEntry],
) -> Option<(&'a KnowledgeEntry, f64)> {
    let mut best: Option<(&KnowledgeEntry, f64)> = None;
    for entry in entries {
        let score = similarity(query, &entry.question);
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((entry, score));
        }
    }
    best
}

pub fn entries_by_topic<'a>(entries: &'a [KnowledgeEntry], topic: &str) -> Vec<&'a KnowledgeEntry> {
    let topic = topic.to_lowercase();
    entries
        .iter()
        .filter(|e| e.topic.to_lowercase() == topic)
        .collect()
}

pub fn entries_by_category<'a>(
    entries: &'a [KnowledgeEntry],
    category: &str,
) -> Vec<&'a KnowledgeEntry> {
    let category = category.to_lowercase();
    entries
        .iter()
        .filter(|e| e.category.to_lowercase() == category)
        .collect()
}

/// Uniform pick, optionally limited to one category.
pub fn random_entry<'a, R: Rng + ?Sized>(
    entries: &'a [KnowledgeEntry],
    category: Option<&str>,
    rng: &mut R,
) -> Option<&'a KnowledgeEntry> {
    match category {
        Some(category) => entries_by_category(entries, category)
            .choose(rng)
            .copied(),
        None => entries.choose(rng),
    }
}

/// Broad recall search: substring over topic, question, answer and tags.
pub fn search_knowledge<'a>(entries: &'a [KnowledgeEntry], query: &str) -> Vec<&'a KnowledgeEntry> {
    let needle = query.to_lowercase();
    entries
        .iter()
        .filter(|e| {
            e.topic.to_lowercase().contains(&needle)
                || e.question.to_lowercase().contains(&needle)
                || e.answer.to_lowercase().contains(&needle)
                || e.tags.iter().any(|t| t.to_lowercase().contains(&needle))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn entry(id: i64, topic: &str, category: &str, question: &str, tags: &[&str]) -> KnowledgeEntry {
        KnowledgeEntry {
            id,
            topic: topic.to_string(),
            category: category.to_string(),
            question: question.to_string(),
            answer: format!("answer {id}"),
            source: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn sample() -> Vec<KnowledgeEntry> {
        vec![
            entry(
                1,
                "Founder",
                "History",
                "Who was the founder of the community?",
                &["founder", "Mirza Ghulam Ahmad"],
            ),
            entry(
                2,
                "Khilafat",
                "Beliefs",
                "What is the belief about Khilafat?",
                &["khilafat", "khalifa"],
            ),
            entry(
                3,
                "Jihad",
                "Beliefs",
                "What is the perspective on Jihad?",
                &["jihad", "peace"],
            ),
        ]
    }

    #[test]
    fn tag_match_beats_better_cosine() {
        let mut entries = sample();
        // Near-verbatim question, but no tag or topic appears in the query.
        entries.insert(
            0,
            entry(0, "Succession", "History", "tell me about khilafat please", &[]),
        );
        let hit = find_relevant_knowledge("tell me about khilafat", &entries, DEFAULT_THRESHOLD)
            .unwrap();
        assert_eq!(hit.entry.topic, "Khilafat");
        assert_eq!(hit.kind, MatchKind::Tag);
        assert_eq!(hit.score, 1.0);
    }

    #[test]
    fn topic_substring_matches_case_insensitively() {
        let entries = vec![entry(1, "Finality of Prophethood", "Beliefs", "q", &[])];
        let hit = find_relevant_knowledge(
            "explain the FINALITY OF PROPHETHOOD to me",
            &entries,
            DEFAULT_THRESHOLD,
        )
        .unwrap();
        assert_eq!(hit.kind, MatchKind::Topic);
    }

    #[test]
    fn first_direct_match_in_order_wins() {
        let entries = vec![
            entry(1, "Peace", "Beliefs", "q1", &["peace"]),
            entry(2, "Jihad", "Beliefs", "q2", &["jihad"]),
        ];
        let hit = find_relevant_knowledge("jihad and peace", &entries, DEFAULT_THRESHOLD).unwrap();
        assert_eq!(hit.entry.id, 1);
    }

    #[test]
    fn blank_tags_and_topics_never_match() {
        let entries = vec![entry(1, "  ", "Beliefs", "unrelated words", &["", " "])];
        assert!(direct_match("anything at all", &entries).is_none());
    }

    #[test]
    fn similarity_pass_returns_best_question() {
        let hit = find_relevant_knowledge(
            "who was the founder of this community",
            &sample()[1..],
            DEFAULT_THRESHOLD,
        );
        assert!(hit.is_none());

        let hit =
            find_relevant_knowledge("who was the first leader", &sample(), DEFAULT_THRESHOLD)
                .unwrap();
        assert_eq!(hit.entry.id, 1);
        assert_eq!(hit.kind, MatchKind::Similarity);
    }

    #[test]
    fn threshold_is_inclusive() {
        let question = format!("zebra zebra zebra {} {} yak", "ox ".repeat(9), "emu ".repeat(3));
        let entries = vec![entry(1, "Mammals", "Nature", &question, &[])];
        let hit = find_relevant_knowledge("zebra", &entries, DEFAULT_THRESHOLD).unwrap();
        assert_eq!(hit.score, 0.3);
    }

    #[test]
    fn just_below_threshold_misses() {
        // 3 / sqrt(101) is roughly 0.2985
        let question = format!(
            "zebra zebra zebra {} {} yak gnu",
            "ox ".repeat(9),
            "emu ".repeat(3)
        );
        let entries = vec![entry(1, "Mammals", "Nature", &question, &[])];
        assert!(find_relevant_knowledge("zebra", &entries, DEFAULT_THRESHOLD).is_none());
    }

    #[test]
    fn similarity_ties_keep_earlier_entry() {
        let entries = vec![
            entry(1, "A", "X", "shared words here", &[]),
            entry(2, "B", "X", "shared words here", &[]),
        ];
        let (best, _) = best_similarity("shared words", &entries).unwrap();
        assert_eq!(best.id, 1);
    }

    #[test]
    fn empty_entry_set_has_no_match() {
        assert!(find_relevant_knowledge("anything", &[], DEFAULT_THRESHOLD).is_none());
    }

    #[test]
    fn topic_and_category_filters_are_exact() {
        let entries = sample();
        assert_eq!(entries_by_topic(&entries, "khilafat").len(), 1);
        assert!(entries_by_topic(&entries, "khila").is_empty());
        assert_eq!(entries_by_category(&entries, "BELIEFS").len(), 2);
    }

    #[test]
    fn random_entry_respects_category() {
        let entries = sample();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let picked = random_entry(&entries, Some("history"), &mut rng).unwrap();
            assert_eq!(picked.id, 1);
        }
        assert!(random_entry(&entries, Some("nonexistent-category"), &mut rng).is_none());
        assert!(random_entry(&[], None, &mut rng).is_none());
    }

    #[test]
    fn search_covers_every_text_field() {
        let entries = sample();
        assert_eq!(search_knowledge(&entries, "ghulam").len(), 1);
        assert_eq!(search_knowledge(&entries, "PERSPECTIVE").len(), 1);
        assert_eq!(search_knowledge(&entries, "answer").len(), 3);
        assert!(search_knowledge(&entries, "kashmir").is_empty());
    }
}
