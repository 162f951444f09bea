pub mod migrations;
pub mod seed;
pub mod store;

use anyhow::Result;
use async_trait::async_trait;
use lorebot_schema::{
    AuthorizedChannel, BotConfig, CommandDefinition, Conversation, KnowledgeEntry,
    NewConversation,
};

pub use store::SqliteStore;

/// Storage capability consumed by the query-resolution core.
///
/// Knowledge listings are always returned in insertion order so that
/// direct-match resolution is reproducible.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn bot_config(&self) -> Result<BotConfig>;
    async fn list_entries(&self) -> Result<Vec<KnowledgeEntry>>;
    /// Case-insensitive exact match on topic.
    async fn entries_by_topic(&self, topic: &str) -> Result<Vec<KnowledgeEntry>>;
    /// Case-insensitive exact match on category.
    async fn entries_by_category(&self, category: &str) -> Result<Vec<KnowledgeEntry>>;
    /// Case-insensitive substring match over topic, question, answer and tags.
    async fn search_entries(&self, query: &str) -> Result<Vec<KnowledgeEntry>>;
    async fn commands(&self) -> Result<Vec<CommandDefinition>>;
    async fn command_by_name(&self, name: &str) -> Result<Option<CommandDefinition>>;
    async fn authorized_channels(&self) -> Result<Vec<AuthorizedChannel>>;
    async fn add_conversation(&self, entry: NewConversation) -> Result<Conversation>;
    async fn recent_conversations(&self, limit: usize) -> Result<Vec<Conversation>>;
}
