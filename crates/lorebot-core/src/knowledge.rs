use std::sync::Arc;

use anyhow::Result;
use lorebot_memory::KnowledgeStore;
use lorebot_schema::KnowledgeEntry;

use crate::matcher::{self, MatchResult, DEFAULT_THRESHOLD};

/// Matcher bound to a store. Every call reloads the entry set, so knowledge
/// edits are visible on the next query.
#[derive(Clone)]
pub struct KnowledgeBase {
    store: Arc<dyn KnowledgeStore>,
    threshold: f64,
}

impl KnowledgeBase {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            store,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    pub async fn find_relevant(&self, query: &str) -> Result<Option<MatchResult>> {
        let entries = self.store.list_entries().await?;
        let found = matcher::find_relevant_knowledge(query, &entries, self.threshold);
        match &found {
            Some(hit) => tracing::debug!(
                topic = %hit.entry.topic,
                score = hit.score,
                kind = ?hit.kind,
                "knowledge match"
            ),
            None => tracing::debug!(query, "no knowledge match"),
        }
        Ok(found)
    }

    pub async fn entries_by_topic(&self, topic: &str) -> Result<Vec<KnowledgeEntry>> {
        self.store.entries_by_topic(topic).await
    }

    pub async fn random_entry(&self, category: Option<&str>) -> Result<Option<KnowledgeEntry>> {
        let entries = self.store.list_entries().await?;
        let mut rng = rand::thread_rng();
        Ok(matcher::random_entry(&entries, category, &mut rng).cloned())
    }

    /// Substring search in entry order, for browsing rather than answering.
    pub async fn search(&self, query: &str) -> Result<Vec<KnowledgeEntry>> {
        let entries = self.store.list_entries().await?;
        Ok(matcher::search_knowledge(&entries, query)
            .into_iter()
            .cloned()
            .collect())
    }
}
