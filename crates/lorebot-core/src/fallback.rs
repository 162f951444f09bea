use std::sync::Arc;
use std::time::Duration;

use lorebot_memory::KnowledgeStore;
use lorebot_provider::{GenerationError, TextGenerator};
use lorebot_schema::{BotConfig, KnowledgeEntry};

use crate::terms::get_search_terms;

const MAX_CONTEXT_ENTRIES: usize = 2;
const MAX_CONTEXT_CHARS: usize = 600;

pub const AI_UNAVAILABLE: &str = "I apologize, I'm having temporary technical difficulties. Please try again shortly.";
pub const AI_WARMING_UP: &str = "The AI model is currently loading. Please try again in a few moments.";
pub const AI_NOT_FOUND: &str = "I apologize, but I'm currently having trouble accessing my knowledge. Please try asking your question again.";
pub const AI_EMPTY: &str = "I apologize, I wasn't able to generate a response.";

/// User-facing apology for a failed generation.
pub fn unavailable_message(err: &GenerationError) -> &'static str {
    match err {
        GenerationError::WarmingUp(_) => AI_WARMING_UP,
        GenerationError::NotFound(_) => AI_NOT_FOUND,
        GenerationError::Empty => AI_EMPTY,
        _ => AI_UNAVAILABLE,
    }
}

/// Generative answer for queries the knowledge base cannot resolve.
#[derive(Clone)]
pub struct Fallback {
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn KnowledgeStore>,
}

impl Fallback {
    pub fn new(generator: Arc<dyn TextGenerator>, store: Arc<dyn KnowledgeStore>) -> Self {
        Self { generator, store }
    }

    pub async fn generate(&self, query: &str, config: &BotConfig) -> Result<String, GenerationError> {
        let context = self.context_entries(query).await;
        let prompt = build_prompt(query, &context, config);

        tracing::info!(
            generator = self.generator.name(),
            context_entries = context.len(),
            "requesting generated answer"
        );

        let call = self.generator.generate(&prompt);
        let result = if config.response_timeout == 0 {
            call.await
        } else {
            tokio::time::timeout(Duration::from_secs(config.response_timeout), call)
                .await
                .map_err(|_| GenerationError::Timeout)?
        };

        match &result {
            Ok(text) => tracing::debug!(chars = text.chars().count(), "generated answer received"),
            Err(e) => tracing::warn!(error = %e, "generation failed"),
        }
        result
    }

    /// Best-effort context lookup; storage trouble only costs the context.
    async fn context_entries(&self, query: &str) -> Vec<KnowledgeEntry> {
        let mut found: Vec<KnowledgeEntry> = Vec::new();
        for term in get_search_terms(query) {
            if found.len() >= MAX_CONTEXT_ENTRIES {
                break;
            }
            match self.store.search_entries(&term).await {
                Ok(entries) => {
                    for entry in entries {
                        if found.len() >= MAX_CONTEXT_ENTRIES {
                            break;
                        }
                        if !found.iter().any(|e| e.id == entry.id) {
                            found.push(entry);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(term = %term, "context search failed: {e}");
                    break;
                }
            }
        }
        found
    }
}

fn style_instruction(response_mode: &str) -> &'static str {
    match response_mode.trim().to_lowercase().as_str() {
        "precise" => "Keep the answer concise and factual.",
        "detailed" => "Give a thorough, well-structured answer.",
        _ => "Answer in a warm, friendly tone.",
    }
}

pub fn build_prompt(query: &str, context: &[KnowledgeEntry], config: &BotConfig) -> String {
    let mut prompt = format!(
        "You are {}, {}\nStay respectful and accurate. {}\n",
        config.name,
        lower_first(&config.description),
        style_instruction(&config.response_mode),
    );

    if !context.is_empty() {
        prompt.push_str("\nRelevant context:\n");
        for entry in context {
            let answer: String = entry.answer.chars().take(MAX_CONTEXT_CHARS).collect();
            prompt.push_str(&format!("- {}: {}\n", entry.topic, answer));
        }
    }

    prompt.push_str(&format!("\nQuestion: {}\nAnswer:", query.trim()));
    prompt
}

fn lower_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lorebot_provider::StubGenerator;

    fn entry(id: i64, topic: &str) -> KnowledgeEntry {
        KnowledgeEntry {
            id,
            topic: topic.into(),
            category: "Beliefs".into(),
            question: format!("What about {topic}?"),
            answer: format!("{topic} answer"),
            source: None,
            tags: Vec::new(),
        }
    }

    #[test]
    fn prompt_ends_with_question() {
        let prompt = build_prompt("  what is prayer? ", &[], &BotConfig::default());
        assert!(prompt.starts_with("You are Ahmadiyya Helper, a Discord bot"));
        assert!(prompt.contains("concise and factual"));
        assert!(prompt.ends_with("Question: what is prayer?\nAnswer:"));
        assert!(!prompt.contains("Relevant context"));
    }

    #[test]
    fn prompt_lists_context_entries() {
        let config = BotConfig {
            response_mode: "detailed".into(),
            ..BotConfig::default()
        };
        let prompt = build_prompt("q", &[entry(1, "Khilafat"), entry(2, "Jihad")], &config);
        assert!(prompt.contains("- Khilafat: Khilafat answer\n"));
        assert!(prompt.contains("- Jihad: Jihad answer\n"));
        assert!(prompt.contains("well-structured"));
    }

    #[test]
    fn apology_depends_on_failure() {
        assert_eq!(
            unavailable_message(&GenerationError::WarmingUp("loading".into())),
            AI_WARMING_UP
        );
        assert_eq!(unavailable_message(&GenerationError::Empty), AI_EMPTY);
        assert_eq!(unavailable_message(&GenerationError::Timeout), AI_UNAVAILABLE);
    }

    #[tokio::test]
    async fn stub_generation_round_trips_question() {
        let store = Arc::new(lorebot_memory::SqliteStore::open_in_memory().unwrap());
        let fallback = Fallback::new(Arc::new(StubGenerator), store);
        let text = fallback
            .generate("why is the sky blue", &BotConfig::default())
            .await
            .unwrap();
        assert_eq!(text, "[stub] why is the sky blue");
    }
}
