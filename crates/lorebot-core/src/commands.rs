//! Prefix command parsing and dispatch.
//!
//! The prefix and the command registry are read per message, so admin edits
//! apply on the next message. Unknown, disabled and handler-less commands all
//! decline exactly like text that is not a command at all.

use anyhow::{Context, Result};
use lorebot_schema::{BotConfig, KnowledgeEntry, Reply};

use crate::context::SenderContext;
use crate::fallback::Fallback;
use crate::format::{self, COLOR_ASK, COLOR_BELIEFS, COLOR_HISTORY};
use crate::knowledge::KnowledgeBase;
use crate::recorder::ConversationRecorder;

pub const COMMAND_FAILED: &str = "There was an error executing that command. Please try again later.";
pub const ASK_AI_UNAVAILABLE: &str = "I'm sorry, I don't have information about that topic and my AI capabilities are currently unavailable.";
pub const ASK_AI_DISABLED: &str = "I don't have information about that topic in my knowledge base. AI responses are currently disabled.";
pub const NO_QUOTES: &str = "I don't have any quotes available at the moment.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Help,
    Ask,
    Beliefs,
    History,
    Quote,
}

const COMMAND_TABLE: &[(&str, CommandKind)] = &[
    ("help", CommandKind::Help),
    ("ask", CommandKind::Ask),
    ("beliefs", CommandKind::Beliefs),
    ("history", CommandKind::History),
    ("quote", CommandKind::Quote),
];

impl CommandKind {
    pub fn from_name(name: &str) -> Option<Self> {
        COMMAND_TABLE
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, kind)| *kind)
    }

    pub fn name(self) -> &'static str {
        COMMAND_TABLE
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(n, _)| *n)
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Lower-cased command name
    pub name: String,
    pub args: Vec<String>,
}

/// Split `text` into a command name and positional args. `None` when the text
/// does not carry the prefix or names no command.
pub fn parse_command(text: &str, prefix: &str) -> Option<ParsedCommand> {
    if prefix.is_empty() {
        return None;
    }
    let rest = text.trim().strip_prefix(prefix)?;
    let mut tokens = rest.split_whitespace();
    let name = tokens.next()?.to_lowercase();
    Some(ParsedCommand {
        name,
        args: tokens.map(str::to_string).collect(),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Not a command for us; the caller falls through to the direct path.
    Declined,
    Handled(Reply),
}

/// The two topic commands differ only in wording and category.
struct TopicCommand {
    kind: CommandKind,
    category: &'static str,
    noun: &'static str,
    example: &'static str,
    title: &'static str,
    color: u32,
    related_query: fn(&str) -> String,
}

fn beliefs_query(topic: &str) -> String {
    format!("beliefs about {topic}")
}

fn history_query(topic: &str) -> String {
    format!("history of {topic}")
}

const BELIEFS: TopicCommand = TopicCommand {
    kind: CommandKind::Beliefs,
    category: "beliefs",
    noun: "belief",
    example: "khilafat",
    title: "Belief",
    color: COLOR_BELIEFS,
    related_query: beliefs_query,
};

const HISTORY: TopicCommand = TopicCommand {
    kind: CommandKind::History,
    category: "history",
    noun: "history",
    example: "founding",
    title: "History",
    color: COLOR_HISTORY,
    related_query: history_query,
};

#[derive(Clone)]
pub struct CommandRouter {
    knowledge: KnowledgeBase,
    fallback: Fallback,
    recorder: ConversationRecorder,
}

impl CommandRouter {
    pub fn new(knowledge: KnowledgeBase, fallback: Fallback) -> Self {
        let recorder = ConversationRecorder::new(knowledge.store().clone());
        Self {
            knowledge,
            fallback,
            recorder,
        }
    }

    /// Registry lookup errors propagate. Handler errors are logged and
    /// reported to the user as a generic failure, and the message still
    /// counts as handled.
    pub async fn route(
        &self,
        ctx: &SenderContext,
        config: &BotConfig,
        text: &str,
    ) -> Result<RouteOutcome> {
        let Some(parsed) = parse_command(text, &config.command_prefix) else {
            return Ok(RouteOutcome::Declined);
        };

        let registered = self
            .knowledge
            .store()
            .command_by_name(&parsed.name)
            .await
            .with_context(|| format!("failed to look up command {}", parsed.name))?;
        let enabled = registered.map(|c| c.enabled).unwrap_or(false);
        let kind = match CommandKind::from_name(&parsed.name) {
            Some(kind) if enabled => kind,
            _ => {
                tracing::debug!(command = %parsed.name, enabled, "command declined");
                return Ok(RouteOutcome::Declined);
            }
        };

        tracing::info!(
            command = kind.name(),
            user_id = %ctx.user_id,
            channel_id = %ctx.channel_id,
            args = parsed.args.len(),
            "dispatching command"
        );

        let reply = match self.execute(kind, ctx, config, &parsed.args).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(command = kind.name(), user_id = %ctx.user_id, "command failed: {e:#}");
                Reply::text(COMMAND_FAILED)
            }
        };
        Ok(RouteOutcome::Handled(reply))
    }

    async fn execute(
        &self,
        kind: CommandKind,
        ctx: &SenderContext,
        config: &BotConfig,
        args: &[String],
    ) -> Result<Reply> {
        match kind {
            CommandKind::Help => self.help(config, args).await,
            CommandKind::Ask => self.ask(ctx, config, args).await,
            CommandKind::Beliefs => self.topic(&BELIEFS, ctx, config, args).await,
            CommandKind::History => self.topic(&HISTORY, ctx, config, args).await,
            CommandKind::Quote => self.quote(ctx, config, args).await,
        }
    }

    async fn help(&self, config: &BotConfig, args: &[String]) -> Result<Reply> {
        let prefix = &config.command_prefix;
        let enabled: Vec<_> = self
            .knowledge
            .store()
            .commands()
            .await?
            .into_iter()
            .filter(|c| c.enabled)
            .collect();

        if let Some(wanted) = args.first().map(|a| a.to_lowercase()) {
            let wanted = wanted.strip_prefix(prefix.as_str()).unwrap_or(&wanted);
            if let Some(cmd) = enabled.iter().find(|c| c.name.to_lowercase() == wanted) {
                let body = format!(
                    "**Description:** {}\n**Usage:** {prefix}{}",
                    cmd.description, cmd.usage
                );
                let title = format!("Help for: {prefix}{}", cmd.name);
                return Ok(format::render_panel(&title, &body, COLOR_ASK, config));
            }
        }

        let mut body = String::new();
        for cmd in &enabled {
            body.push_str(&format!(
                "**{prefix}{}** - {}\nUsage: {prefix}{}\n\n",
                cmd.name, cmd.description, cmd.usage
            ));
        }
        body.push_str(&format!(
            "For more detailed help, use the command: `{prefix}help [command name]`"
        ));
        Ok(format::render_panel(
            "Available Commands",
            &body,
            COLOR_ASK,
            config,
        ))
    }

    async fn ask(&self, ctx: &SenderContext, config: &BotConfig, args: &[String]) -> Result<Reply> {
        if args.is_empty() {
            return Ok(Reply::text(format!(
                "Please ask a question. For example: `{}ask Who founded the Ahmadiyya community?`",
                config.command_prefix
            )));
        }
        let question = args.join(" ");

        if let Some(hit) = self.knowledge.find_relevant(&question).await? {
            self.recorder
                .record(ctx, &question, &hit.entry.answer)
                .await?;
            let color = format::category_color(&hit.entry.category);
            return Ok(format::render_entry(
                &hit.entry,
                &hit.entry.topic,
                color,
                config,
            ));
        }

        if !config.use_ai {
            return Ok(Reply::text(ASK_AI_DISABLED));
        }

        match self.fallback.generate(&question, config).await {
            Ok(text) => {
                self.recorder.record(ctx, &question, &text).await?;
                Ok(format::render_generated(&text, config))
            }
            Err(e) => {
                tracing::warn!(user_id = %ctx.user_id, "ask fallback unavailable: {e}");
                Ok(Reply::text(ASK_AI_UNAVAILABLE))
            }
        }
    }

    async fn topic(
        &self,
        spec: &TopicCommand,
        ctx: &SenderContext,
        config: &BotConfig,
        args: &[String],
    ) -> Result<Reply> {
        let prefix = &config.command_prefix;
        if args.is_empty() {
            return Ok(Reply::text(format!(
                "Please specify a {} topic. For example: `{prefix}{} {}`",
                spec.noun,
                spec.kind.name(),
                spec.example
            )));
        }
        let topic = args.join(" ");
        let recorded_query = format!("{prefix}{} {topic}", spec.kind.name());

        let in_category = self
            .knowledge
            .entries_by_topic(&topic)
            .await?
            .into_iter()
            .find(|e| e.category.eq_ignore_ascii_case(spec.category));

        let (entry, title): (KnowledgeEntry, String) = match in_category {
            Some(entry) => {
                let title = format!("{}: {}", spec.title, entry.topic);
                (entry, title)
            }
            None => match self
                .knowledge
                .find_relevant(&(spec.related_query)(&topic))
                .await?
            {
                Some(hit) => {
                    let title = format!("Related Information: {}", hit.entry.topic);
                    (hit.entry, title)
                }
                None => {
                    tracing::debug!(command = spec.kind.name(), topic = %topic, "no entry for topic");
                    return Ok(Reply::text(format!(
                        "I don't have specific information about Ahmadiyya {} on \"{topic}\".",
                        spec.category
                    )));
                }
            },
        };

        self.recorder
            .record(ctx, &recorded_query, &entry.answer)
            .await?;
        Ok(format::render_entry(&entry, &title, spec.color, config))
    }

    async fn quote(&self, ctx: &SenderContext, config: &BotConfig, args: &[String]) -> Result<Reply> {
        let prefix = &config.command_prefix;
        let category = (!args.is_empty()).then(|| args.join(" "));

        let Some(entry) = self.knowledge.random_entry(category.as_deref()).await? else {
            return Ok(Reply::text(match &category {
                Some(category) => {
                    format!("I don't have any quotes in the category \"{category}\".")
                }
                None => NO_QUOTES.to_string(),
            }));
        };

        let recorded_query = match &category {
            Some(category) => format!("{prefix}quote {category}"),
            None => format!("{prefix}quote"),
        };
        self.recorder
            .record(ctx, &recorded_query, &entry.answer)
            .await?;
        Ok(format::render_entry(&entry, &entry.topic, COLOR_ASK, config))
    }
}
