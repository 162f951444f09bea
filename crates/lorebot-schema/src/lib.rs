use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub trace_id: Uuid,
    pub channel_type: String,
    pub connector_id: String,
    pub conversation_scope: String,
    /// Platform channel id, used for authorized-channel checks and conversation records
    pub channel_id: String,
    pub user_id: String,
    pub username: String,
    pub text: String,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub is_direct: bool,
    #[serde(default)]
    pub is_mention: bool,
    /// Bot user id when the message mentions the bot, used to strip mention markup
    #[serde(default)]
    pub mention_target: Option<String>,
    /// Platform-specific message ID for replies
    #[serde(default)]
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub trace_id: Uuid,
    pub channel_type: String,
    pub connector_id: String,
    pub conversation_scope: String,
    pub reply: Reply,
    pub at: DateTime<Utc>,
    /// Reply to a specific message
    #[serde(default)]
    pub reply_to: Option<String>,
}

/// Content handed back to the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "content")]
pub enum Reply {
    Text(String),
    Embed(EmbedPayload),
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Flatten an embed for transports without rich rendering.
    pub fn to_plain_text(&self) -> String {
        match self {
            Reply::Text(text) => text.clone(),
            Reply::Embed(embed) => {
                let mut out = format!("**{}**\n\n{}", embed.title, embed.description);
                for field in &embed.fields {
                    out.push_str(&format!("\n\n{}: {}", field.name, field.value));
                }
                if let Some(footer) = &embed.footer {
                    out.push_str(&format!("\n\n_{footer}_"));
                }
                out
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedPayload {
    pub title: String,
    pub description: String,
    pub color: u32,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
    #[serde(default)]
    pub footer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: i64,
    pub topic: String,
    pub category: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Knowledge entry before storage assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewKnowledgeEntry {
    pub topic: String,
    pub category: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub user_id: String,
    pub username: String,
    pub channel: String,
    pub query: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConversation {
    pub user_id: String,
    pub username: String,
    pub channel: String,
    pub query: String,
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub name: String,
    pub description: String,
    /// Usage without the command prefix, e.g. "ask [question]"
    pub usage: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedChannel {
    pub channel_id: String,
    pub channel_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl ResponseLength {
    pub fn max_chars(self) -> usize {
        match self {
            ResponseLength::Short => 400,
            ResponseLength::Medium => 1000,
            ResponseLength::Long => 1900,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResponseLength::Short => "short",
            ResponseLength::Medium => "medium",
            ResponseLength::Long => "long",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "short" => ResponseLength::Short,
            "long" => ResponseLength::Long,
            _ => ResponseLength::Medium,
        }
    }
}

fn default_name() -> String {
    "Ahmadiyya Helper".to_string()
}

fn default_description() -> String {
    "A Discord bot that answers questions about Ahmadiyya beliefs, history, and teachings."
        .to_string()
}

fn default_status() -> String {
    "online".to_string()
}

fn default_activity_type() -> String {
    "Playing".to_string()
}

fn default_activity_name() -> String {
    "Answering questions".to_string()
}

fn default_command_prefix() -> String {
    "!".to_string()
}

fn default_response_mode() -> String {
    "precise".to_string()
}

fn default_response_timeout() -> u64 {
    15
}

fn default_true() -> bool {
    true
}

/// Live bot behavior. Exactly one row exists in storage and it is re-read for
/// every inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_activity_type")]
    pub activity_type: String,
    #[serde(default = "default_activity_name")]
    pub activity_name: String,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    #[serde(default = "default_response_mode")]
    pub response_mode: String,
    /// Seconds allowed for a generative call; 0 disables the limit
    #[serde(default = "default_response_timeout")]
    pub response_timeout: u64,
    #[serde(default)]
    pub max_response_length: ResponseLength,
    #[serde(default = "default_true")]
    pub include_citations: bool,
    #[serde(default = "default_true")]
    pub use_embeds: bool,
    #[serde(default = "default_true")]
    pub use_ai: bool,
    #[serde(default = "default_true")]
    pub respond_to_direct_messages: bool,
    #[serde(default = "default_true")]
    pub respond_to_mentions: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: default_description(),
            status: default_status(),
            activity_type: default_activity_type(),
            activity_name: default_activity_name(),
            command_prefix: default_command_prefix(),
            response_mode: default_response_mode(),
            response_timeout: default_response_timeout(),
            max_response_length: ResponseLength::default(),
            include_citations: true,
            use_embeds: true,
            use_ai: true,
            respond_to_direct_messages: true,
            respond_to_mentions: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_message_serde_roundtrip() {
        let msg = InboundMessage {
            trace_id: Uuid::new_v4(),
            channel_type: "discord".into(),
            connector_id: "dc_main".into(),
            conversation_scope: "guild:1:channel:2".into(),
            channel_id: "2".into(),
            user_id: "42".into(),
            username: "amina".into(),
            text: "!ask who founded the community".into(),
            at: Utc::now(),
            is_direct: false,
            is_mention: true,
            mention_target: Some("99".into()),
            message_id: Some("555".into()),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let de: InboundMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(de.trace_id, msg.trace_id);
        assert_eq!(de.mention_target.as_deref(), Some("99"));
        assert!(de.is_mention);
    }

    #[test]
    fn inbound_message_backward_compat_without_flags() {
        let json = serde_json::json!({
            "trace_id": Uuid::new_v4(),
            "channel_type": "repl",
            "connector_id": "repl",
            "conversation_scope": "repl:0",
            "channel_id": "repl",
            "user_id": "local",
            "username": "local",
            "text": "hello",
            "at": Utc::now()
        });
        let msg: InboundMessage = serde_json::from_value(json).unwrap();
        assert!(!msg.is_direct);
        assert!(!msg.is_mention);
        assert!(msg.mention_target.is_none());
    }

    #[test]
    fn bot_config_defaults_from_empty_object() {
        let config: BotConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, BotConfig::default());
        assert_eq!(config.command_prefix, "!");
        assert_eq!(config.response_timeout, 15);
        assert_eq!(config.max_response_length, ResponseLength::Medium);
        assert!(config.use_ai && config.use_embeds && config.include_citations);
    }

    #[test]
    fn response_length_parse_is_lenient() {
        assert_eq!(ResponseLength::parse("SHORT"), ResponseLength::Short);
        assert_eq!(ResponseLength::parse("long"), ResponseLength::Long);
        assert_eq!(ResponseLength::parse("whatever"), ResponseLength::Medium);
        assert!(ResponseLength::Short.max_chars() < ResponseLength::Long.max_chars());
    }

    #[test]
    fn reply_text_is_plain() {
        assert_eq!(Reply::text("hi").to_plain_text(), "hi");
    }

    #[test]
    fn reply_embed_flattens_fields_and_footer() {
        let reply = Reply::Embed(EmbedPayload {
            title: "Founder".into(),
            description: "answer".into(),
            color: 0x00b0f4,
            fields: vec![EmbedField {
                name: "Source".into(),
                value: "X".into(),
                inline: false,
            }],
            footer: Some("Ahmadiyya Helper".into()),
        });
        let text = reply.to_plain_text();
        assert!(text.starts_with("**Founder**\n\nanswer"));
        assert!(text.contains("\n\nSource: X"));
        assert!(text.ends_with("_Ahmadiyya Helper_"));
    }

    #[test]
    fn reply_serde_is_tagged() {
        let json = serde_json::to_value(Reply::text("hello")).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["content"], "hello");
    }
}
