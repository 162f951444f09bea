use std::collections::HashMap as StdHashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use lorebot_core::{CommandRouter, DirectResponder, RateLimitConfig, RouteOutcome, SenderContext};
use lorebot_memory::KnowledgeStore;
use lorebot_schema::*;
use tokio::sync::Mutex as TokioMutex;

/// Conversation channel recorded when the transport reports none.
const DIRECT_MESSAGE_CHANNEL: &str = "direct_message";

pub const STORAGE_APOLOGY: &str =
    "I'm sorry, I'm having trouble reaching my knowledge base right now. Please try again shortly.";

struct TokenBucket {
    tokens: f64,
    max_tokens: f64,
    refill_rate: f64,
    last_refill: chrono::DateTime<chrono::Utc>,
}

impl TokenBucket {
    fn new(config: &RateLimitConfig) -> Self {
        Self {
            tokens: config.burst as f64,
            max_tokens: config.burst as f64,
            refill_rate: config.requests_per_minute as f64 / 60.0,
            last_refill: chrono::Utc::now(),
        }
    }

    fn try_consume(&mut self) -> bool {
        let now = chrono::Utc::now();
        let elapsed = (now - self.last_refill).num_milliseconds() as f64 / 1000.0;
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-user token buckets.
pub struct RateLimiter {
    buckets: Arc<TokioMutex<StdHashMap<String, TokenBucket>>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: Arc::new(TokioMutex::new(StdHashMap::new())),
            config,
        }
    }

    pub async fn check(&self, key: &str) -> bool {
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(&self.config));
        bucket.try_consume()
    }
}

/// Which path answered a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Command,
    Direct,
    Mention,
    AuthorizedChannel,
    /// Storage failed and the apology was sent instead.
    Failed,
}

/// Remove `<@id>` and `<@!id>` markup for `bot_id`.
pub fn strip_mention(text: &str, bot_id: &str) -> String {
    text.replace(&format!("<@!{bot_id}>"), "")
        .replace(&format!("<@{bot_id}>"), "")
        .trim()
        .to_string()
}

pub struct Gateway {
    store: Arc<dyn KnowledgeStore>,
    router: CommandRouter,
    responder: DirectResponder,
    rate_limiter: RateLimiter,
}

impl Gateway {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        router: CommandRouter,
        responder: DirectResponder,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            store,
            router,
            responder,
            rate_limiter,
        }
    }

    /// Route one inbound message. `None` means the bot stays silent.
    ///
    /// Storage failures while resolving the message are logged and answered
    /// with [`STORAGE_APOLOGY`].
    pub async fn handle_inbound(&self, inbound: InboundMessage) -> Result<Option<OutboundMessage>> {
        if !self.rate_limiter.check(&inbound.user_id).await {
            tracing::warn!(
                user_id = %inbound.user_id,
                channel_id = %inbound.channel_id,
                "rate limited: dropping message"
            );
            return Ok(None);
        }

        let (dispatch, reply) = match self.resolve(&inbound).await {
            Ok(Some(answered)) => answered,
            Ok(None) => {
                tracing::trace!(trace_id = %inbound.trace_id, "message ignored");
                return Ok(None);
            }
            Err(e) => {
                tracing::error!(
                    trace_id = %inbound.trace_id,
                    user_id = %inbound.user_id,
                    channel_id = %inbound.channel_id,
                    "failed to resolve message: {e:#}"
                );
                (Dispatch::Failed, Reply::text(STORAGE_APOLOGY))
            }
        };

        tracing::info!(
            trace_id = %inbound.trace_id,
            user_id = %inbound.user_id,
            channel_id = %inbound.channel_id,
            dispatch = ?dispatch,
            "message answered"
        );

        Ok(Some(OutboundMessage {
            trace_id: inbound.trace_id,
            channel_type: inbound.channel_type,
            connector_id: inbound.connector_id,
            conversation_scope: inbound.conversation_scope,
            reply,
            at: chrono::Utc::now(),
            reply_to: inbound.message_id,
        }))
    }

    async fn resolve(&self, inbound: &InboundMessage) -> Result<Option<(Dispatch, Reply)>> {
        let config = self
            .store
            .bot_config()
            .await
            .context("failed to load bot config")?;
        self.dispatch(inbound, &config).await
    }

    async fn dispatch(
        &self,
        inbound: &InboundMessage,
        config: &BotConfig,
    ) -> Result<Option<(Dispatch, Reply)>> {
        let channel = if inbound.channel_id.is_empty() {
            DIRECT_MESSAGE_CHANNEL
        } else {
            inbound.channel_id.as_str()
        };
        let ctx = SenderContext::new(&inbound.user_id, &inbound.username, channel);

        if let RouteOutcome::Handled(reply) = self.router.route(&ctx, config, &inbound.text).await? {
            return Ok(Some((Dispatch::Command, reply)));
        }

        if inbound.is_direct && config.respond_to_direct_messages {
            let reply = self.responder.respond(&ctx, config, &inbound.text).await;
            return Ok(Some((Dispatch::Direct, reply)));
        }

        if inbound.is_mention && config.respond_to_mentions {
            let text = match &inbound.mention_target {
                Some(bot_id) => strip_mention(&inbound.text, bot_id),
                None => inbound.text.trim().to_string(),
            };
            let reply = self.responder.respond(&ctx, config, &text).await;
            return Ok(Some((Dispatch::Mention, reply)));
        }

        let authorized = self
            .store
            .authorized_channels()
            .await
            .context("failed to load authorized channels")?
            .iter()
            .any(|c| c.channel_id == inbound.channel_id);
        if authorized {
            let reply = self.responder.respond(&ctx, config, &inbound.text).await;
            return Ok(Some((Dispatch::AuthorizedChannel, reply)));
        }

        Ok(None)
    }
}
