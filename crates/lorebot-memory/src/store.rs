use crate::migrations::run_migrations;
use crate::seed;
use crate::KnowledgeStore;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lorebot_schema::{
    AuthorizedChannel, BotConfig, CommandDefinition, Conversation, KnowledgeEntry,
    NewConversation, NewKnowledgeEntry, ResponseLength,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};
use tokio::task;

const ENTRY_COLUMNS: &str = "id, topic, category, question, answer, source, tags";

#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        run_migrations(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            f(&*conn)
        })
        .await?
    }

    /// Writes the default config, commands, channels and knowledge when no
    /// config row exists yet. Returns whether anything was written.
    pub async fn seed_defaults(&self) -> Result<bool> {
        self.blocking(|conn| {
            let existing: i64 =
                conn.query_row("SELECT COUNT(*) FROM bot_config", [], |r| r.get(0))?;
            if existing > 0 {
                return Ok(false);
            }

            let tx = conn.unchecked_transaction()?;
            write_bot_config(&tx, &BotConfig::default())?;
            for command in seed::default_commands() {
                write_command(&tx, &command)?;
            }
            for channel in seed::default_channels() {
                tx.execute(
                    "INSERT OR IGNORE INTO authorized_channels (channel_id, channel_name) VALUES (?1, ?2)",
                    params![channel.channel_id, channel.channel_name],
                )?;
            }
            for entry in seed::default_knowledge() {
                insert_entry(&tx, &entry)?;
            }
            tx.commit()?;
            tracing::info!("seeded default bot config, commands and knowledge base");
            Ok(true)
        })
        .await
    }

    pub async fn add_entry(&self, entry: NewKnowledgeEntry) -> Result<KnowledgeEntry> {
        self.blocking(move |conn| insert_entry(conn, &entry)).await
    }

    pub async fn update_bot_config(&self, config: BotConfig) -> Result<()> {
        self.blocking(move |conn| write_bot_config(conn, &config))
            .await
    }

    pub async fn upsert_command(&self, command: CommandDefinition) -> Result<()> {
        self.blocking(move |conn| write_command(conn, &command)).await
    }

    /// Returns false when no command has that name.
    pub async fn set_command_enabled(&self, name: &str, enabled: bool) -> Result<bool> {
        let name = name.to_lowercase();
        self.blocking(move |conn| {
            let changed = conn.execute(
                "UPDATE commands SET enabled = ?1 WHERE name = ?2",
                params![enabled, name],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    pub async fn add_authorized_channel(&self, channel: AuthorizedChannel) -> Result<()> {
        self.blocking(move |conn| {
            conn.execute(
                r#"
                INSERT INTO authorized_channels (channel_id, channel_name) VALUES (?1, ?2)
                ON CONFLICT(channel_id) DO UPDATE SET channel_name = excluded.channel_name
                "#,
                params![channel.channel_id, channel.channel_name],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn remove_authorized_channel(&self, channel_id: &str) -> Result<bool> {
        let channel_id = channel_id.to_owned();
        self.blocking(move |conn| {
            let removed = conn.execute(
                "DELETE FROM authorized_channels WHERE channel_id = ?1",
                params![channel_id],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn filtered_entries<F>(&self, keep: F) -> Result<Vec<KnowledgeEntry>>
    where
        F: Fn(&KnowledgeEntry) -> bool + Send + 'static,
    {
        self.blocking(move |conn| {
            let entries = load_entries(conn)?;
            Ok(entries.into_iter().filter(|e| keep(e)).collect())
        })
        .await
    }
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn bot_config(&self) -> Result<BotConfig> {
        self.blocking(|conn| {
            let config = conn
                .query_row(
                    r#"
                    SELECT name, description, status, activity_type, activity_name,
                           command_prefix, response_mode, response_timeout, max_response_length,
                           include_citations, use_embeds, use_ai,
                           respond_to_direct_messages, respond_to_mentions
                    FROM bot_config WHERE id = 1
                    "#,
                    [],
                    row_to_bot_config,
                )
                .optional()?;
            Ok(config.unwrap_or_default())
        })
        .await
    }

    async fn list_entries(&self) -> Result<Vec<KnowledgeEntry>> {
        self.blocking(load_entries).await
    }

    async fn entries_by_topic(&self, topic: &str) -> Result<Vec<KnowledgeEntry>> {
        let topic = topic.to_lowercase();
        self.filtered_entries(move |e| e.topic.to_lowercase() == topic)
            .await
    }

    async fn entries_by_category(&self, category: &str) -> Result<Vec<KnowledgeEntry>> {
        let category = category.to_lowercase();
        self.filtered_entries(move |e| e.category.to_lowercase() == category)
            .await
    }

    async fn search_entries(&self, query: &str) -> Result<Vec<KnowledgeEntry>> {
        let needle = query.to_lowercase();
        self.filtered_entries(move |e| {
            e.topic.to_lowercase().contains(&needle)
                || e.question.to_lowercase().contains(&needle)
                || e.answer.to_lowercase().contains(&needle)
                || e.tags.iter().any(|t| t.to_lowercase().contains(&needle))
        })
        .await
    }

    async fn commands(&self) -> Result<Vec<CommandDefinition>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name, description, usage, enabled FROM commands ORDER BY id ASC",
            )?;
            let rows = stmt.query_map([], row_to_command)?;
            let mut commands = Vec::new();
            for row in rows {
                commands.push(row?);
            }
            Ok(commands)
        })
        .await
    }

    async fn command_by_name(&self, name: &str) -> Result<Option<CommandDefinition>> {
        let name = name.to_owned();
        self.blocking(move |conn| {
            let command = conn
                .query_row(
                    "SELECT name, description, usage, enabled FROM commands WHERE name = ?1",
                    params![name],
                    row_to_command,
                )
                .optional()?;
            Ok(command)
        })
        .await
    }

    async fn authorized_channels(&self) -> Result<Vec<AuthorizedChannel>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare(
                "SELECT channel_id, channel_name FROM authorized_channels ORDER BY channel_id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(AuthorizedChannel {
                    channel_id: row.get(0)?,
                    channel_name: row.get(1)?,
                })
            })?;
            let mut channels = Vec::new();
            for row in rows {
                channels.push(row?);
            }
            Ok(channels)
        })
        .await
    }

    async fn add_conversation(&self, entry: NewConversation) -> Result<Conversation> {
        self.blocking(move |conn| {
            let timestamp = Utc::now();
            conn.execute(
                r#"
                INSERT INTO conversations (user_id, username, channel, query, response, timestamp)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    entry.user_id,
                    entry.username,
                    entry.channel,
                    entry.query,
                    entry.response,
                    timestamp.to_rfc3339(),
                ],
            )?;
            Ok(Conversation {
                id: conn.last_insert_rowid(),
                user_id: entry.user_id,
                username: entry.username,
                channel: entry.channel,
                query: entry.query,
                response: entry.response,
                timestamp,
            })
        })
        .await
    }

    async fn recent_conversations(&self, limit: usize) -> Result<Vec<Conversation>> {
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, user_id, username, channel, query, response, timestamp
                FROM conversations
                ORDER BY id DESC
                LIMIT ?1
                "#,
            )?;
            let rows = stmt.query_map(params![limit as i64], row_to_conversation)?;
            let mut conversations = Vec::new();
            for row in rows {
                conversations.push(row?);
            }
            Ok(conversations)
        })
        .await
    }
}

fn load_entries(conn: &Connection) -> Result<Vec<KnowledgeEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM knowledge_base ORDER BY id ASC"
    ))?;
    let rows = stmt.query_map([], row_to_entry)?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

fn insert_entry(conn: &Connection, entry: &NewKnowledgeEntry) -> Result<KnowledgeEntry> {
    let tags = serde_json::to_string(&entry.tags)?;
    conn.execute(
        r#"
        INSERT INTO knowledge_base (topic, category, question, answer, source, tags, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            entry.topic,
            entry.category,
            entry.question,
            entry.answer,
            entry.source,
            tags,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(KnowledgeEntry {
        id: conn.last_insert_rowid(),
        topic: entry.topic.clone(),
        category: entry.category.clone(),
        question: entry.question.clone(),
        answer: entry.answer.clone(),
        source: entry.source.clone(),
        tags: entry.tags.clone(),
    })
}

fn write_bot_config(conn: &Connection, config: &BotConfig) -> Result<()> {
    conn.execute(
        r#"
        INSERT OR REPLACE INTO bot_config (
            id, name, description, status, activity_type, activity_name,
            command_prefix, response_mode, response_timeout, max_response_length,
            include_citations, use_embeds, use_ai,
            respond_to_direct_messages, respond_to_mentions
        ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
        params![
            config.name,
            config.description,
            config.status,
            config.activity_type,
            config.activity_name,
            config.command_prefix,
            config.response_mode,
            config.response_timeout as i64,
            config.max_response_length.as_str(),
            config.include_citations,
            config.use_embeds,
            config.use_ai,
            config.respond_to_direct_messages,
            config.respond_to_mentions,
        ],
    )?;
    Ok(())
}

fn write_command(conn: &Connection, command: &CommandDefinition) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO commands (name, description, usage, enabled) VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(name) DO UPDATE SET
            description = excluded.description,
            usage = excluded.usage,
            enabled = excluded.enabled
        "#,
        params![
            command.name.to_lowercase(),
            command.description,
            command.usage,
            command.enabled,
        ],
    )?;
    Ok(())
}

fn parse_datetime_sql(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<KnowledgeEntry> {
    let tags_raw: String = row.get(6)?;
    let tags: Vec<String> = serde_json::from_str(&tags_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(KnowledgeEntry {
        id: row.get(0)?,
        topic: row.get(1)?,
        category: row.get(2)?,
        question: row.get(3)?,
        answer: row.get(4)?,
        source: row.get(5)?,
        tags,
    })
}

fn row_to_command(row: &Row<'_>) -> rusqlite::Result<CommandDefinition> {
    Ok(CommandDefinition {
        name: row.get(0)?,
        description: row.get(1)?,
        usage: row.get(2)?,
        enabled: row.get(3)?,
    })
}

fn row_to_conversation(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    let ts_raw: String = row.get(6)?;
    Ok(Conversation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        channel: row.get(3)?,
        query: row.get(4)?,
        response: row.get(5)?,
        timestamp: parse_datetime_sql(&ts_raw)?,
    })
}

fn row_to_bot_config(row: &Row<'_>) -> rusqlite::Result<BotConfig> {
    let timeout: i64 = row.get(7)?;
    let length: String = row.get(8)?;
    Ok(BotConfig {
        name: row.get(0)?,
        description: row.get(1)?,
        status: row.get(2)?,
        activity_type: row.get(3)?,
        activity_name: row.get(4)?,
        command_prefix: row.get(5)?,
        response_mode: row.get(6)?,
        response_timeout: timeout.max(0) as u64,
        max_response_length: ResponseLength::parse(&length),
        include_citations: row.get(9)?,
        use_embeds: row.get(10)?,
        use_ai: row.get(11)?,
        respond_to_direct_messages: row.get(12)?,
        respond_to_mentions: row.get(13)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(topic: &str, category: &str, tags: &[&str]) -> NewKnowledgeEntry {
        NewKnowledgeEntry {
            topic: topic.to_owned(),
            category: category.to_owned(),
            question: format!("What about {topic}?"),
            answer: format!("All about {topic}."),
            source: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn make_conversation(query: &str) -> NewConversation {
        NewConversation {
            user_id: "42".to_owned(),
            username: "amina".to_owned(),
            channel: "12345".to_owned(),
            query: query.to_owned(),
            response: "answer".to_owned(),
        }
    }

    #[tokio::test]
    async fn open_in_memory_succeeds() {
        let store = SqliteStore::open_in_memory();
        assert!(store.is_ok());
    }

    #[tokio::test]
    async fn bot_config_defaults_when_row_missing() {
        let store = SqliteStore::open_in_memory().expect("store");
        let config = store.bot_config().await.expect("config");
        assert_eq!(config, BotConfig::default());
    }

    #[tokio::test]
    async fn seed_defaults_runs_once() {
        let store = SqliteStore::open_in_memory().expect("store");
        assert!(store.seed_defaults().await.expect("seed"));
        assert!(!store.seed_defaults().await.expect("reseed"));

        assert_eq!(store.commands().await.expect("commands").len(), 5);
        assert_eq!(store.list_entries().await.expect("entries").len(), 5);
        assert_eq!(store.authorized_channels().await.expect("channels").len(), 3);
    }

    #[tokio::test]
    async fn update_bot_config_roundtrips() {
        let store = SqliteStore::open_in_memory().expect("store");
        let config = BotConfig {
            command_prefix: "?".into(),
            use_ai: false,
            response_timeout: 0,
            max_response_length: ResponseLength::Long,
            ..BotConfig::default()
        };
        store.update_bot_config(config.clone()).await.expect("update");
        assert_eq!(store.bot_config().await.expect("config"), config);
    }

    #[tokio::test]
    async fn list_entries_preserves_insertion_order() {
        let store = SqliteStore::open_in_memory().expect("store");
        for topic in ["Zeta", "Alpha", "Mid"] {
            store
                .add_entry(make_entry(topic, "Beliefs", &[]))
                .await
                .expect("insert");
        }
        let topics: Vec<_> = store
            .list_entries()
            .await
            .expect("list")
            .into_iter()
            .map(|e| e.topic)
            .collect();
        assert_eq!(topics, vec!["Zeta", "Alpha", "Mid"]);
    }

    #[tokio::test]
    async fn topic_and_category_filters_are_case_insensitive_exact() {
        let store = SqliteStore::open_in_memory().expect("store");
        store
            .add_entry(make_entry("Khilafat", "Beliefs", &["khalifa"]))
            .await
            .expect("insert");
        store
            .add_entry(make_entry("Khilafat Jubilee", "History", &[]))
            .await
            .expect("insert");

        let by_topic = store.entries_by_topic("KHILAFAT").await.expect("topic");
        assert_eq!(by_topic.len(), 1);
        assert_eq!(by_topic[0].category, "Beliefs");

        let by_category = store.entries_by_category("history").await.expect("category");
        assert_eq!(by_category.len(), 1);
        assert_eq!(by_category[0].topic, "Khilafat Jubilee");
    }

    #[tokio::test]
    async fn search_entries_matches_tags_and_text() {
        let store = SqliteStore::open_in_memory().expect("store");
        store
            .add_entry(make_entry("Jesus", "Beliefs", &["Kashmir"]))
            .await
            .expect("insert");
        store
            .add_entry(make_entry("Jihad", "Beliefs", &["peace"]))
            .await
            .expect("insert");

        let hits = store.search_entries("kashmir").await.expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].topic, "Jesus");

        let hits = store.search_entries("ALL ABOUT").await.expect("search");
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn tags_roundtrip_as_json() {
        let store = SqliteStore::open_in_memory().expect("store");
        let created = store
            .add_entry(make_entry("Founder", "History", &["founder", "Mirza Ghulam Ahmad"]))
            .await
            .expect("insert");
        let entries = store.list_entries().await.expect("list");
        assert_eq!(entries, vec![created]);
        assert_eq!(entries[0].tags[1], "Mirza Ghulam Ahmad");
    }

    #[tokio::test]
    async fn malformed_tags_surface_as_an_error() {
        let store = SqliteStore::open_in_memory().expect("store");
        let created = store
            .add_entry(make_entry("Founder", "History", &["founder"]))
            .await
            .expect("insert");
        {
            let conn = store.db.lock().expect("lock");
            conn.execute(
                "UPDATE knowledge_base SET tags = ?1 WHERE id = ?2",
                rusqlite::params!["[\"founder\"", created.id],
            )
            .expect("corrupt tags");
        }
        assert!(store.list_entries().await.is_err());
    }

    #[tokio::test]
    async fn set_command_enabled_toggles_existing_commands() {
        let store = SqliteStore::open_in_memory().expect("store");
        store.seed_defaults().await.expect("seed");

        assert!(store.set_command_enabled("QUOTE", false).await.expect("disable"));
        let quote = store
            .command_by_name("quote")
            .await
            .expect("lookup")
            .expect("quote exists");
        assert!(!quote.enabled);

        assert!(!store.set_command_enabled("missing", true).await.expect("noop"));
        assert!(store.command_by_name("missing").await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn authorized_channels_add_and_remove() {
        let store = SqliteStore::open_in_memory().expect("store");
        store
            .add_authorized_channel(AuthorizedChannel {
                channel_id: "777".into(),
                channel_name: "qa".into(),
            })
            .await
            .expect("add");
        assert_eq!(store.authorized_channels().await.expect("list").len(), 1);
        assert!(store.remove_authorized_channel("777").await.expect("remove"));
        assert!(!store.remove_authorized_channel("777").await.expect("remove again"));
    }

    #[tokio::test]
    async fn conversations_append_and_list_newest_first() {
        let store = SqliteStore::open_in_memory().expect("store");
        let first = store
            .add_conversation(make_conversation("first"))
            .await
            .expect("first");
        store
            .add_conversation(make_conversation("second"))
            .await
            .expect("second");
        store
            .add_conversation(make_conversation("third"))
            .await
            .expect("third");

        assert_eq!(first.query, "first");
        let recent = store.recent_conversations(2).await.expect("recent");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].query, "third");
        assert_eq!(recent[1].query, "second");
    }

    #[tokio::test]
    async fn open_on_disk_persists_between_handles() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let path = tmp.path().join("lorebot.db");
        let path = path.to_str().expect("utf8 path");

        let store = SqliteStore::open(path).expect("open");
        store.seed_defaults().await.expect("seed");
        drop(store);

        let reopened = SqliteStore::open(path).expect("reopen");
        assert!(!reopened.seed_defaults().await.expect("seed again"));
        assert_eq!(reopened.list_entries().await.expect("list").len(), 5);
    }
}
