use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use lorebot_channels::discord::DiscordBot;
use lorebot_channels::ChannelBot;
use lorebot_core::*;
use lorebot_gateway::{Gateway, RateLimiter};
use lorebot_memory::{KnowledgeStore, SqliteStore};
use lorebot_provider::create_generator;
use lorebot_schema::{InboundMessage, NewKnowledgeEntry};

const SKELETON_CONFIG: &str = include_str!("../../../config/main.yaml");

#[derive(Parser)]
#[command(name = "lorebot", version, about = "lorebot knowledge bot")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.lorebot",
        help = "Config root directory (contains config/, data/ and logs/)"
    )]
    config_root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start the configured Discord connectors")]
    Start,
    #[command(about = "Local REPL for testing (no Discord needed)")]
    Chat,
    #[command(about = "Validate config files")]
    Validate,
    #[command(subcommand, about = "Knowledge base management")]
    Knowledge(KnowledgeCommands),
    #[command(subcommand, about = "Command management")]
    Command(CommandCommands),
    #[command(about = "Show recent conversations")]
    Conversations {
        #[arg(long, default_value_t = 10, help = "Number of conversations to show")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum KnowledgeCommands {
    #[command(about = "List all knowledge entries")]
    List,
    #[command(about = "Search knowledge entries")]
    Search {
        #[arg(help = "Search query")]
        query: String,
    },
    #[command(about = "Import knowledge entries from a YAML file")]
    Import {
        #[arg(help = "YAML file with a list of entries")]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum CommandCommands {
    #[command(about = "List registered commands")]
    List,
    #[command(about = "Enable a command")]
    Enable {
        #[arg(help = "Command name")]
        name: String,
    },
    #[command(about = "Disable a command")]
    Disable {
        #[arg(help = "Command name")]
        name: String,
    },
}

struct App {
    config: MainConfig,
    store: Arc<SqliteStore>,
    knowledge: KnowledgeBase,
    gateway: Arc<Gateway>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    cli.config_root = expand_home(&cli.config_root);

    let log_dir = cli.config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "lorebot.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let root = cli.config_root;
    match command {
        Commands::Validate => {
            let config = load_config(&root.join("config"))?;
            let connectors = config
                .channels
                .discord
                .as_ref()
                .map(|d| d.connectors.len())
                .unwrap_or(0);
            println!(
                "Config valid. generator={:?}, threshold={}, {} discord connector(s).",
                config.generator.provider, config.matcher.threshold, connectors
            );
        }
        Commands::Start => {
            ensure_skeleton_config(&root)?;
            start_bots(&root).await?;
        }
        Commands::Chat => {
            ensure_skeleton_config(&root)?;
            run_repl(&root).await?;
        }
        Commands::Knowledge(cmd) => {
            let app = bootstrap(&root).await?;
            match cmd {
                KnowledgeCommands::List => {
                    let entries = app.store.list_entries().await?;
                    print_entries(&entries);
                }
                KnowledgeCommands::Search { query } => {
                    let hits = app.knowledge.search(&query).await?;
                    if hits.is_empty() {
                        println!("No entries match '{query}'.");
                    } else {
                        print_entries(&hits);
                    }
                }
                KnowledgeCommands::Import { file } => {
                    let entries: Vec<NewKnowledgeEntry> = read_yaml_file(&file)?;
                    let count = entries.len();
                    for entry in entries {
                        app.store.add_entry(entry).await?;
                    }
                    println!("Imported {count} entries from {}.", file.display());
                }
            }
        }
        Commands::Command(cmd) => {
            let app = bootstrap(&root).await?;
            match cmd {
                CommandCommands::List => {
                    let prefix = app.store.bot_config().await?.command_prefix;
                    println!("{:<12} {:<10} {:<28} DESCRIPTION", "NAME", "ENABLED", "USAGE");
                    println!("{}", "-".repeat(80));
                    for command in app.store.commands().await? {
                        println!(
                            "{:<12} {:<10} {:<28} {}",
                            command.name,
                            if command.enabled { "yes" } else { "no" },
                            format!("{prefix}{}", command.usage),
                            command.description,
                        );
                    }
                }
                CommandCommands::Enable { name } => {
                    toggle_command(&app.store, &name, true).await?;
                    println!("Command '{name}' enabled.");
                }
                CommandCommands::Disable { name } => {
                    toggle_command(&app.store, &name, false).await?;
                    println!("Command '{name}' disabled.");
                }
            }
        }
        Commands::Conversations { limit } => {
            let app = bootstrap(&root).await?;
            let conversations = app.store.recent_conversations(limit).await?;
            if conversations.is_empty() {
                println!("No conversations recorded yet.");
            }
            for c in conversations {
                println!(
                    "[{}] #{} {} ({}): {}",
                    c.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    c.channel,
                    c.username,
                    c.user_id,
                    c.query
                );
                println!("  -> {}", one_line(&c.response, 120));
            }
        }
    }

    Ok(())
}

fn expand_home(path: &Path) -> PathBuf {
    if path.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(path.strip_prefix("~").unwrap_or(path));
        }
    }
    path.to_path_buf()
}

fn ensure_skeleton_config(root: &Path) -> Result<()> {
    let config_dir = root.join("config");
    let main_yaml = config_dir.join("main.yaml");
    if main_yaml.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(&config_dir)?;
    std::fs::write(&main_yaml, SKELETON_CONFIG)
        .with_context(|| format!("failed to write {}", main_yaml.display()))?;
    tracing::info!("wrote skeleton config to {}", main_yaml.display());
    Ok(())
}

async fn bootstrap(root: &Path) -> Result<App> {
    let config = load_config(&root.join("config"))?;

    let db_path = root.join(&config.database.path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = Arc::new(
        SqliteStore::open(&db_path.to_string_lossy())
            .with_context(|| format!("failed to open database {}", db_path.display()))?,
    );
    if store.seed_defaults().await? {
        tracing::info!("seeded default knowledge base at {}", db_path.display());
    }

    let generator = create_generator(&config.generator)?;
    tracing::info!(generator = generator.name(), "generator ready");

    let dyn_store: Arc<dyn KnowledgeStore> = store.clone();
    let knowledge = KnowledgeBase::new(dyn_store.clone()).with_threshold(config.matcher.threshold);
    tracing::info!(threshold = knowledge.threshold(), "knowledge matcher ready");
    let fallback = Fallback::new(generator, dyn_store.clone());

    let router = CommandRouter::new(knowledge.clone(), fallback.clone());
    let responder = DirectResponder::new(knowledge.clone(), fallback);
    let rate_limiter = RateLimiter::new(config.gateway.rate_limit.clone());
    let gateway = Arc::new(Gateway::new(
        dyn_store.clone(),
        router,
        responder,
        rate_limiter,
    ));

    Ok(App {
        config,
        store,
        knowledge,
        gateway,
    })
}

async fn start_bots(root: &Path) -> Result<()> {
    let app = bootstrap(root).await?;
    let dyn_store: Arc<dyn KnowledgeStore> = app.store.clone();

    let mut bots: Vec<Box<dyn ChannelBot>> = Vec::new();
    if let Some(dc_config) = &app.config.channels.discord {
        if dc_config.enabled {
            for connector in &dc_config.connectors {
                if connector.token.trim().is_empty() {
                    tracing::warn!(
                        "Discord token is empty for connector {}, skipping",
                        connector.connector_id
                    );
                    continue;
                }
                tracing::info!("Registering Discord bot: {}", connector.connector_id);
                bots.push(Box::new(DiscordBot::new(
                    connector.token.clone(),
                    connector.connector_id.clone(),
                    app.gateway.clone(),
                    dyn_store.clone(),
                )));
            }
        }
    }

    if bots.is_empty() {
        anyhow::bail!(
            "no channel bots configured or enabled; set channels.discord in {}",
            root.join("config/main.yaml").display()
        );
    }

    tracing::info!("Starting {} channel bot(s)", bots.len());
    let mut handles = Vec::new();
    for bot in bots {
        let channel = bot.channel_type().to_string();
        let connector = bot.connector_id().to_string();
        handles.push(tokio::spawn(async move {
            tracing::info!("Starting {channel} bot: {connector}");
            if let Err(err) = bot.run().await {
                tracing::error!("{channel} bot ({connector}) exited with error: {err:#}");
            }
        }));
    }

    let bots_done = async {
        for handle in handles {
            let _ = handle.await;
        }
    };

    tokio::select! {
        _ = bots_done => tracing::warn!("all channel bots exited"),
        res = shutdown_signal() => res?,
    }
    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .context("failed to install SIGTERM handler")?;
        tokio::select! {
            _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        tracing::info!("Received SIGINT, shutting down...");
    }
    Ok(())
}

fn repl_inbound(text: &str) -> InboundMessage {
    InboundMessage {
        trace_id: uuid::Uuid::new_v4(),
        channel_type: "repl".into(),
        connector_id: "repl".into(),
        conversation_scope: "repl:0".into(),
        channel_id: String::new(),
        user_id: "user:local".into(),
        username: "local".into(),
        text: text.to_string(),
        at: chrono::Utc::now(),
        is_direct: true,
        is_mention: false,
        mention_target: None,
        message_id: None,
    }
}

async fn run_repl(root: &Path) -> Result<()> {
    let app = bootstrap(root).await?;

    println!("lorebot REPL. Type 'quit' to exit.");
    println!("---");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input == "quit" || input == "exit" {
            break;
        }
        if input.is_empty() {
            continue;
        }

        match app.gateway.handle_inbound(repl_inbound(input)).await {
            Ok(Some(out)) => println!("{}", out.reply.to_plain_text()),
            Ok(None) => println!("(no reply)"),
            Err(err) => eprintln!("Error: {err:#}"),
        }
    }

    Ok(())
}

async fn toggle_command(store: &SqliteStore, name: &str, enabled: bool) -> Result<()> {
    if !store.set_command_enabled(name, enabled).await? {
        anyhow::bail!("command not found: {name}");
    }
    Ok(())
}

fn print_entries(entries: &[lorebot_schema::KnowledgeEntry]) {
    println!("{:<5} {:<28} {:<12} QUESTION", "ID", "TOPIC", "CATEGORY");
    println!("{}", "-".repeat(80));
    for entry in entries {
        println!(
            "{:<5} {:<28} {:<12} {}",
            entry.id,
            one_line(&entry.topic, 26),
            entry.category,
            one_line(&entry.question, 60)
        );
    }
}

fn one_line(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > max {
        let cut: String = flat.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_subcommand() {
        let cli = Cli::try_parse_from(["lorebot", "start"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Start)));
        assert_eq!(cli.config_root, PathBuf::from("~/.lorebot"));
    }

    #[test]
    fn no_subcommand_is_allowed() {
        let cli = Cli::try_parse_from(["lorebot"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_knowledge_search() {
        let cli = Cli::try_parse_from(["lorebot", "knowledge", "search", "khilafat"]).unwrap();
        match cli.command {
            Some(Commands::Knowledge(KnowledgeCommands::Search { query })) => {
                assert_eq!(query, "khilafat")
            }
            _ => panic!("expected knowledge search"),
        }
    }

    #[test]
    fn parses_command_disable() {
        let cli = Cli::try_parse_from(["lorebot", "command", "disable", "quote"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Command(CommandCommands::Disable { .. }))
        ));
    }

    #[test]
    fn conversations_limit_defaults_to_ten() {
        let cli = Cli::try_parse_from(["lorebot", "conversations"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Conversations { limit: 10 })
        ));
        let cli = Cli::try_parse_from(["lorebot", "conversations", "--limit", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Conversations { limit: 3 })
        ));
    }

    #[test]
    fn config_root_flag_overrides_default() {
        let cli = Cli::try_parse_from(["lorebot", "--config-root", "/tmp/lb", "validate"]).unwrap();
        assert_eq!(cli.config_root, PathBuf::from("/tmp/lb"));
    }

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home(Path::new("/srv/lb")), PathBuf::from("/srv/lb"));
    }

    #[test]
    fn skeleton_config_is_written_once_and_loads() {
        let dir = tempfile::tempdir().unwrap();
        ensure_skeleton_config(dir.path()).unwrap();
        let path = dir.path().join("config/main.yaml");
        std::fs::write(&path, SKELETON_CONFIG.replace("lorebot", "custom")).unwrap();
        ensure_skeleton_config(dir.path()).unwrap();
        let config = load_config(&dir.path().join("config")).unwrap();
        assert_eq!(config.app.name, "custom");
    }

    #[tokio::test]
    async fn repl_message_reaches_gateway_as_direct() {
        let dir = tempfile::tempdir().unwrap();
        ensure_skeleton_config(dir.path()).unwrap();
        let app = bootstrap(dir.path()).await.unwrap();
        let out = app
            .gateway
            .handle_inbound(repl_inbound("!help"))
            .await
            .unwrap()
            .unwrap();
        assert!(out.reply.to_plain_text().contains("Available Commands"));
        assert!(dir.path().join("data/lorebot.db").exists());
    }

    #[test]
    fn one_line_flattens_and_truncates() {
        assert_eq!(one_line("a\n b", 10), "a b");
        assert_eq!(one_line("abcdefghij", 6), "abc...");
    }
}
