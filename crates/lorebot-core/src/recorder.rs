use std::sync::Arc;

use anyhow::{Context, Result};
use lorebot_memory::KnowledgeStore;
use lorebot_schema::{Conversation, NewConversation};

use crate::context::SenderContext;

/// Appends resolved exchanges to the conversation log.
#[derive(Clone)]
pub struct ConversationRecorder {
    store: Arc<dyn KnowledgeStore>,
}

impl ConversationRecorder {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }

    pub async fn record(
        &self,
        ctx: &SenderContext,
        query: &str,
        response: &str,
    ) -> Result<Conversation> {
        let conversation = self
            .store
            .add_conversation(NewConversation {
                user_id: ctx.user_id.clone(),
                username: ctx.username.clone(),
                channel: ctx.channel_id.clone(),
                query: query.to_string(),
                response: response.to_string(),
            })
            .await
            .context("failed to record conversation")?;
        tracing::debug!(
            user_id = %ctx.user_id,
            channel_id = %ctx.channel_id,
            conversation_id = conversation.id,
            "conversation recorded"
        );
        Ok(conversation)
    }
}
