use anyhow::Result;
use lorebot_schema::{BotConfig, Reply};

use crate::context::SenderContext;
use crate::fallback::{unavailable_message, Fallback};
use crate::format;
use crate::knowledge::KnowledgeBase;
use crate::recorder::ConversationRecorder;
use crate::terms::extract_topic;

pub const DIRECT_APOLOGY: &str = "SubhanAllah, I seem to be having a technical difficulty. Please give me a moment to recollect my thoughts and try again.";

/// Answers direct messages, mentions and authorized-channel chatter.
///
/// Unlike `ask` there is no argument guard, and a knowledge miss always goes
/// to the generator whatever `use_ai` says. Every answer is recorded, the
/// generator's apology included.
#[derive(Clone)]
pub struct DirectResponder {
    knowledge: KnowledgeBase,
    fallback: Fallback,
    recorder: ConversationRecorder,
}

impl DirectResponder {
    pub fn new(knowledge: KnowledgeBase, fallback: Fallback) -> Self {
        let recorder = ConversationRecorder::new(knowledge.store().clone());
        Self {
            knowledge,
            fallback,
            recorder,
        }
    }

    pub async fn respond(&self, ctx: &SenderContext, config: &BotConfig, text: &str) -> Reply {
        match self.try_respond(ctx, config, text.trim()).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(
                    user_id = %ctx.user_id,
                    channel_id = %ctx.channel_id,
                    "direct message failed: {e:#}"
                );
                Reply::text(DIRECT_APOLOGY)
            }
        }
    }

    async fn try_respond(&self, ctx: &SenderContext, config: &BotConfig, query: &str) -> Result<Reply> {
        tracing::debug!(topic = ?extract_topic(query), "direct message");

        if let Some(hit) = self.knowledge.find_relevant(query).await? {
            self.recorder.record(ctx, query, &hit.entry.answer).await?;
            let color = format::category_color(&hit.entry.category);
            return Ok(format::render_entry(&hit.entry, &hit.entry.topic, color, config));
        }

        match self.fallback.generate(query, config).await {
            Ok(text) => {
                self.recorder.record(ctx, query, &text).await?;
                Ok(format::render_generated(&text, config))
            }
            Err(e) => {
                let apology = unavailable_message(&e);
                self.recorder.record(ctx, query, apology).await?;
                Ok(Reply::text(apology))
            }
        }
    }
}
