pub mod commands;
pub mod config;
pub mod context;
pub mod fallback;
pub mod format;
pub mod knowledge;
pub mod matcher;
pub mod recorder;
pub mod responder;
pub mod similarity;
pub mod terms;

pub use commands::{parse_command, CommandKind, CommandRouter, ParsedCommand, RouteOutcome};
pub use config::*;
pub use context::SenderContext;
pub use fallback::Fallback;
pub use knowledge::KnowledgeBase;
pub use matcher::{find_relevant_knowledge, MatchKind, MatchResult, DEFAULT_THRESHOLD};
pub use recorder::ConversationRecorder;
pub use responder::DirectResponder;
pub use similarity::similarity;
pub use terms::{extract_terms, extract_topic, get_search_terms};
