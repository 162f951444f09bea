use std::{collections::HashSet, fs, path::Path};

use anyhow::{anyhow, Context, Result};
use lorebot_provider::{GeneratorConfig, ProviderType};
use serde::{Deserialize, Serialize};

use crate::matcher::DEFAULT_THRESHOLD;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub env: String,
}

fn default_database_path() -> String {
    "data/lorebot.db".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Relative paths resolve against the config root
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

fn default_requests_per_minute() -> u32 {
    30
}

fn default_burst() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            burst: default_burst(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatewayConfig {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConnectorConfig {
    pub connector_id: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordChannelConfig {
    pub enabled: bool,
    #[serde(default)]
    pub connectors: Vec<DiscordConnectorConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub discord: Option<DiscordChannelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainConfig {
    pub app: AppConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
}

pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

/// Read `main.yaml` from `dir`, expand `${VAR}` placeholders and validate.
pub fn load_config(dir: &Path) -> Result<MainConfig> {
    let mut main: MainConfig = read_yaml_file(&dir.join("main.yaml"))?;
    resolve_main_env(&mut main);
    validate_config(&main)?;
    Ok(main)
}

pub fn validate_config(config: &MainConfig) -> Result<()> {
    let threshold = config.matcher.threshold;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(anyhow!(
            "matcher.threshold must be within [0, 1], got {threshold}"
        ));
    }

    if config.database.path.trim().is_empty() {
        return Err(anyhow!("database.path must not be empty"));
    }

    let generator = &config.generator;
    match generator.provider {
        ProviderType::HuggingFace | ProviderType::OpenAI if generator.api_key().is_none() => {
            return Err(anyhow!(
                "generator.api_key is required for provider {:?}",
                generator.provider
            ));
        }
        ProviderType::OpenAI if generator.model.is_none() => {
            return Err(anyhow!("generator.model is required for provider OpenAI"));
        }
        _ => {}
    }

    if let Some(discord) = &config.channels.discord {
        let mut seen = HashSet::new();
        for connector in &discord.connectors {
            if !seen.insert(connector.connector_id.as_str()) {
                return Err(anyhow!(
                    "duplicate discord connector_id: {}",
                    connector.connector_id
                ));
            }
        }
    }

    Ok(())
}

pub fn read_yaml_file<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))
}

fn resolve_optional(value: &mut Option<String>) {
    if let Some(v) = value {
        *v = resolve_env_var(v);
    }
}

fn resolve_main_env(main: &mut MainConfig) {
    main.app.name = resolve_env_var(&main.app.name);
    main.app.env = resolve_env_var(&main.app.env);
    main.database.path = resolve_env_var(&main.database.path);

    resolve_optional(&mut main.generator.api_key);
    resolve_optional(&mut main.generator.base_url);
    resolve_optional(&mut main.generator.model);

    if let Some(discord) = &mut main.channels.discord {
        for connector in &mut discord.connectors {
            connector.connector_id = resolve_env_var(&connector.connector_id);
            connector.token = resolve_env_var(&connector.token);
        }
    }
}
