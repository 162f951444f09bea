//! Rendering of knowledge entries and generated text into replies.
//!
//! The text and embed forms carry the same information: answer body, title,
//! and the source when citations are on.

use lorebot_schema::{BotConfig, EmbedField, EmbedPayload, KnowledgeEntry, Reply};

pub const COLOR_ASK: u32 = 0x00b0f4;
pub const COLOR_BELIEFS: u32 = 0x2D7D46;
pub const COLOR_HISTORY: u32 = 0x5865F2;
pub const COLOR_AI: u32 = 0x9b59b6;

pub const AI_TITLE: &str = "AI Response";
pub const AI_FOOTER: &str = "AI-Generated Response";
const AI_NOTICE: &str = "*This is an AI-generated response*";

const ELLIPSIS: char = '…';

/// Appends the citation line only when a source exists and citations are on.
pub fn format_response(answer: &str, source: Option<&str>, include_citation: bool) -> String {
    match source {
        Some(source) if include_citation && !source.trim().is_empty() => {
            format!("{answer}\n\nSource: {source}")
        }
        _ => answer.to_string(),
    }
}

/// Cap `text` at `max` chars, ellipsis included.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push(ELLIPSIS);
    out
}

pub fn category_color(category: &str) -> u32 {
    match category.to_lowercase().as_str() {
        "beliefs" => COLOR_BELIEFS,
        "history" => COLOR_HISTORY,
        _ => COLOR_ASK,
    }
}

fn citation<'a>(entry: &'a KnowledgeEntry, config: &BotConfig) -> Option<&'a str> {
    entry
        .source
        .as_deref()
        .filter(|s| config.include_citations && !s.trim().is_empty())
}

/// Render a knowledge hit. The embed form uses `title` and `color`; the text
/// form is the answer plus citation.
pub fn render_entry(entry: &KnowledgeEntry, title: &str, color: u32, config: &BotConfig) -> Reply {
    let body = truncate(&entry.answer, config.max_response_length.max_chars());
    let source = citation(entry, config);

    if config.use_embeds {
        let fields = source
            .map(|s| EmbedField {
                name: "Source".to_string(),
                value: s.to_string(),
                inline: false,
            })
            .into_iter()
            .collect();
        Reply::Embed(EmbedPayload {
            title: title.to_string(),
            description: body,
            color,
            fields,
            footer: Some(config.name.clone()),
        })
    } else {
        Reply::Text(format_response(&body, source, config.include_citations))
    }
}

pub fn render_generated(text: &str, config: &BotConfig) -> Reply {
    let body = truncate(text, config.max_response_length.max_chars());
    if config.use_embeds {
        Reply::Embed(EmbedPayload {
            title: AI_TITLE.to_string(),
            description: body,
            color: COLOR_AI,
            fields: Vec::new(),
            footer: Some(AI_FOOTER.to_string()),
        })
    } else {
        Reply::Text(format!("{body}\n\n{AI_NOTICE}"))
    }
}

/// Titled block for informational replies such as help.
pub fn render_panel(title: &str, body: &str, color: u32, config: &BotConfig) -> Reply {
    if config.use_embeds {
        Reply::Embed(EmbedPayload {
            title: title.to_string(),
            description: body.to_string(),
            color,
            fields: Vec::new(),
            footer: Some(config.name.clone()),
        })
    } else {
        Reply::Text(format!("**{title}**\n\n{body}"))
    }
}
