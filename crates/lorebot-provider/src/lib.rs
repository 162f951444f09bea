pub mod huggingface;
pub mod openai_compat;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use huggingface::HuggingFaceGenerator;
pub use openai_compat::OpenAiCompatGenerator;

/// Text generation capability used when the knowledge base has no answer.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
    fn name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("model is warming up: {0}")]
    WarmingUp(String),
    #[error("model not found: {0}")]
    NotFound(String),
    #[error("api error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("model returned no text")]
    Empty,
    #[error("api key is not configured")]
    MissingApiKey,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GenerationError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::WarmingUp(_)
            | GenerationError::Timeout
            | GenerationError::Connect(_) => true,
            GenerationError::Api { status, .. } => matches!(status, 429 | 500..=599),
            _ => false,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationError::Timeout
        } else if err.is_connect() {
            GenerationError::Connect(err.to_string())
        } else {
            GenerationError::Other(err.into())
        }
    }

    pub(crate) fn from_status(status: u16, body: String) -> Self {
        match status {
            503 => GenerationError::WarmingUp(body),
            404 => GenerationError::NotFound(body),
            _ => GenerationError::Api { status, body },
        }
    }
}

// ============================================================
// Generator Configuration
// ============================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    HuggingFace,
    /// Any OpenAI-compatible chat completions endpoint
    OpenAI,
    Stub,
}

fn default_provider() -> ProviderType {
    ProviderType::HuggingFace
}

fn default_max_new_tokens() -> u32 {
    500
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.95
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderType,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: None,
            base_url: None,
            model: None,
            max_new_tokens: default_max_new_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

impl GeneratorConfig {
    pub fn new(provider: ProviderType) -> Self {
        Self {
            provider,
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Key after env resolution; blank counts as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

/// Sampling parameters shared by the HTTP generators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_new_tokens: default_max_new_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

impl From<&GeneratorConfig> for SamplingParams {
    fn from(config: &GeneratorConfig) -> Self {
        Self {
            max_new_tokens: config.max_new_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        }
    }
}

/// Create a generator from configuration.
pub fn create_generator(config: &GeneratorConfig) -> Result<Arc<dyn TextGenerator>> {
    let params = SamplingParams::from(config);
    let generator: Arc<dyn TextGenerator> = match config.provider {
        ProviderType::HuggingFace => {
            let key = config
                .api_key()
                .ok_or_else(|| anyhow!("huggingface generator requires api_key"))?;
            let base_url = config
                .base_url
                .as_deref()
                .unwrap_or(huggingface::HUGGINGFACE_API_BASE);
            let model = config
                .model
                .as_deref()
                .unwrap_or(huggingface::DEFAULT_MODEL);
            Arc::new(HuggingFaceGenerator::new(key, base_url, model).with_params(params))
        }
        ProviderType::OpenAI => {
            let key = config
                .api_key()
                .ok_or_else(|| anyhow!("openai generator requires api_key"))?;
            let base_url = config
                .base_url
                .as_deref()
                .unwrap_or(openai_compat::OPENAI_API_BASE);
            let model = config
                .model
                .as_deref()
                .ok_or_else(|| anyhow!("openai generator requires model"))?;
            Arc::new(OpenAiCompatGenerator::new(key, base_url, model).with_params(params))
        }
        ProviderType::Stub => Arc::new(StubGenerator),
    };
    tracing::info!(generator = generator.name(), "text generator ready");
    Ok(generator)
}

/// Offline generator that echoes the question back.
pub struct StubGenerator;

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let question = prompt
            .lines()
            .rev()
            .find_map(|line| line.trim().strip_prefix("Question:"))
            .map(str::trim)
            .unwrap_or_else(|| prompt.trim());
        Ok(format!("[stub] {question}"))
    }

    fn name(&self) -> &str {
        "stub"
    }
}
