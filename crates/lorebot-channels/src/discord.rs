use std::sync::Arc;

use chrono::Utc;
use lorebot_gateway::Gateway;
use lorebot_memory::KnowledgeStore;
use lorebot_schema::{BotConfig, EmbedPayload, InboundMessage, OutboundMessage, Reply};
use serenity::all::{
    ActivityData, ChannelId, Client, Context, CreateEmbed, CreateEmbedFooter, CreateMessage,
    EventHandler, GatewayIntents, Message, MessageId, OnlineStatus, Ready,
};
use serenity::async_trait;
use uuid::Uuid;

const TYPING_REFRESH_SECS: u64 = 8;

pub struct DiscordAdapter {
    connector_id: String,
}

impl DiscordAdapter {
    pub fn new(connector_id: impl Into<String>) -> Self {
        Self {
            connector_id: connector_id.into(),
        }
    }

    pub fn to_inbound(
        &self,
        guild_id: Option<u64>,
        channel_id: u64,
        user_id: u64,
        username: &str,
        text: &str,
    ) -> InboundMessage {
        let conversation_scope = match guild_id {
            Some(gid) => format!("guild:{gid}:channel:{channel_id}"),
            None => format!("dm:{channel_id}"),
        };
        InboundMessage {
            trace_id: Uuid::new_v4(),
            channel_type: "discord".to_string(),
            connector_id: self.connector_id.clone(),
            conversation_scope,
            channel_id: channel_id.to_string(),
            user_id: user_id.to_string(),
            username: username.to_string(),
            text: text.to_string(),
            at: Utc::now(),
            is_direct: guild_id.is_none(),
            is_mention: false,
            mention_target: None,
            message_id: None,
        }
    }
}

pub fn render_embed(embed: &EmbedPayload) -> CreateEmbed {
    let mut out = CreateEmbed::new()
        .title(&embed.title)
        .description(&embed.description)
        .colour(embed.color);
    for field in &embed.fields {
        out = out.field(&field.name, &field.value, field.inline);
    }
    if let Some(footer) = &embed.footer {
        out = out.footer(CreateEmbedFooter::new(footer));
    }
    out
}

pub fn render_message(channel_id: ChannelId, outbound: &OutboundMessage) -> CreateMessage {
    let builder = match &outbound.reply {
        Reply::Text(text) => CreateMessage::new().content(text),
        Reply::Embed(embed) => CreateMessage::new().embed(render_embed(embed)),
    };
    match outbound.reply_to.as_deref().and_then(|id| id.parse::<u64>().ok()) {
        Some(id) => builder.reference_message((channel_id, MessageId::new(id))),
        None => builder,
    }
}

pub fn online_status(status: &str) -> OnlineStatus {
    match status.trim().to_lowercase().as_str() {
        "idle" => OnlineStatus::Idle,
        "dnd" | "do not disturb" => OnlineStatus::DoNotDisturb,
        "invisible" => OnlineStatus::Invisible,
        _ => OnlineStatus::Online,
    }
}

/// Streaming needs a URL the config does not carry, so it shows as playing.
pub fn activity(kind: &str, name: &str) -> ActivityData {
    match kind.trim().to_lowercase().as_str() {
        "listening" => ActivityData::listening(name),
        "watching" => ActivityData::watching(name),
        "competing" => ActivityData::competing(name),
        "custom" => ActivityData::custom(name),
        _ => ActivityData::playing(name),
    }
}

pub struct DiscordBot {
    token: String,
    connector_id: String,
    gateway: Arc<Gateway>,
    store: Arc<dyn KnowledgeStore>,
}

impl DiscordBot {
    pub fn new(
        token: String,
        connector_id: String,
        gateway: Arc<Gateway>,
        store: Arc<dyn KnowledgeStore>,
    ) -> Self {
        Self {
            token,
            connector_id,
            gateway,
            store,
        }
    }

    pub async fn run_impl(self) -> anyhow::Result<()> {
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        let handler = DiscordHandler {
            connector_id: self.connector_id,
            gateway: self.gateway,
            store: self.store,
        };

        let mut client = Client::builder(self.token, intents)
            .event_handler(handler)
            .await?;
        client.start().await?;
        Ok(())
    }
}

#[async_trait]
impl crate::ChannelBot for DiscordBot {
    fn channel_type(&self) -> &str {
        "discord"
    }

    fn connector_id(&self) -> &str {
        &self.connector_id
    }

    async fn run(self: Box<Self>) -> anyhow::Result<()> {
        (*self).run_impl().await
    }
}

struct DiscordHandler {
    connector_id: String,
    gateway: Arc<Gateway>,
    store: Arc<dyn KnowledgeStore>,
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!(
            "discord bot connected: {} ({})",
            ready.user.name,
            self.connector_id
        );

        let config = match self.store.bot_config().await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("failed to load bot config for presence: {e:#}");
                BotConfig::default()
            }
        };
        ctx.set_presence(
            Some(activity(&config.activity_type, &config.activity_name)),
            online_status(&config.status),
        );
        tracing::info!(
            status = %config.status,
            activity = %config.activity_type,
            "discord presence applied"
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let text = msg.content.trim();
        if text.is_empty() {
            return;
        }

        let adapter = DiscordAdapter::new(self.connector_id.clone());
        let guild_id = msg.guild_id.map(|id| id.get());
        let channel_id = msg.channel_id;
        let current_user_id = ctx.cache.current_user().id;
        let is_mention = msg.mentions.iter().any(|u| u.id == current_user_id);

        let mut inbound = adapter.to_inbound(
            guild_id,
            channel_id.get(),
            msg.author.id.get(),
            &msg.author.name,
            text,
        );
        inbound.is_mention = is_mention;
        inbound.mention_target = is_mention.then(|| current_user_id.get().to_string());
        inbound.message_id = Some(msg.id.get().to_string());

        if inbound.is_direct || is_mention {
            let _ = channel_id.broadcast_typing(&ctx.http).await;
        }

        let gateway = self.gateway.clone();
        let http = ctx.http.clone();
        tokio::spawn(async move {
            let typing_handle = tokio::spawn({
                let http = http.clone();
                async move {
                    loop {
                        tokio::time::sleep(std::time::Duration::from_secs(TYPING_REFRESH_SECS))
                            .await;
                        if channel_id.broadcast_typing(&http).await.is_err() {
                            break;
                        }
                    }
                }
            });

            let result = gateway.handle_inbound(inbound).await;
            typing_handle.abort();

            match result {
                Ok(Some(outbound)) => {
                    let message = render_message(channel_id, &outbound);
                    if let Err(err) = channel_id.send_message(&http, message).await {
                        tracing::error!("failed to send discord reply: {err}");
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::error!("discord gateway error: {err:#}");
                    let _ = channel_id
                        .say(&http, "Internal error, please try again later.")
                        .await;
                }
            }
        });
    }
}
