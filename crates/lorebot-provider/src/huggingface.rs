//! Hugging Face hosted inference API
//!
//! https://huggingface.co/docs/api-inference/detailed_parameters#text-generation-task

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{GenerationError, SamplingParams, TextGenerator};

pub const HUGGINGFACE_API_BASE: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_MODEL: &str = "mistralai/Mistral-7B-Instruct-v0.1";

#[derive(Debug, Clone)]
pub struct HuggingFaceGenerator {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    params: SamplingParams,
}

impl HuggingFaceGenerator {
    pub fn new(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            model: model.into(),
            params: SamplingParams::default(),
        }
    }

    pub fn with_params(mut self, params: SamplingParams) -> Self {
        self.params = params;
        self
    }

    fn build_request<'a>(&self, prompt: &'a str) -> HfRequest<'a> {
        HfRequest {
            inputs: prompt,
            parameters: HfParameters {
                max_new_tokens: self.params.max_new_tokens,
                temperature: self.params.temperature,
                top_p: self.params.top_p,
                return_full_text: false,
            },
            options: HfOptions {
                wait_for_model: true,
            },
        }
    }
}

#[async_trait]
impl TextGenerator for HuggingFaceGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        if self.api_key.trim().is_empty() {
            return Err(GenerationError::MissingApiKey);
        }

        let url = format!("{}/models/{}", self.api_base, self.model);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(prompt))
            .send()
            .await
            .map_err(GenerationError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), model = %self.model, "huggingface api error");
            return Err(GenerationError::from_status(status.as_u16(), body));
        }

        let body: HfResponse = resp.json().await.map_err(GenerationError::from_reqwest)?;
        body.into_text().ok_or(GenerationError::Empty)
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}

// ============================================================
// Hugging Face API Types
// ============================================================

#[derive(Debug, Serialize)]
struct HfRequest<'a> {
    inputs: &'a str,
    parameters: HfParameters,
    options: HfOptions,
}

#[derive(Debug, Serialize)]
struct HfParameters {
    max_new_tokens: u32,
    temperature: f32,
    top_p: f32,
    return_full_text: bool,
}

#[derive(Debug, Serialize)]
struct HfOptions {
    wait_for_model: bool,
}

#[derive(Debug, Deserialize)]
struct HfGenerated {
    #[serde(default)]
    generated_text: Option<String>,
}

/// The endpoint answers with a list for text-generation models and a bare
/// object for some hosted pipelines.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HfResponse {
    Many(Vec<HfGenerated>),
    One(HfGenerated),
}

impl HfResponse {
    fn into_text(self) -> Option<String> {
        let generated = match self {
            HfResponse::Many(items) => items.into_iter().next()?,
            HfResponse::One(item) => item,
        };
        generated
            .generated_text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_sampling_parameters() {
        let generator = HuggingFaceGenerator::new("hf_test", HUGGINGFACE_API_BASE, DEFAULT_MODEL);
        let json = serde_json::to_value(generator.build_request("hello")).unwrap();
        assert_eq!(json["inputs"], "hello");
        assert_eq!(json["parameters"]["max_new_tokens"], 500);
        assert_eq!(json["parameters"]["return_full_text"], false);
        assert_eq!(json["options"]["wait_for_model"], true);
    }

    #[test]
    fn response_accepts_list_and_object_shapes() {
        let list: HfResponse =
            serde_json::from_str(r#"[{"generated_text": " Salaam "}]"#).unwrap();
        assert_eq!(list.into_text().as_deref(), Some("Salaam"));

        let object: HfResponse = serde_json::from_str(r#"{"generated_text": "ok"}"#).unwrap();
        assert_eq!(object.into_text().as_deref(), Some("ok"));
    }

    #[test]
    fn blank_generation_is_none() {
        let empty: HfResponse = serde_json::from_str(r#"[{"generated_text": "   "}]"#).unwrap();
        assert!(empty.into_text().is_none());

        let none: HfResponse = serde_json::from_str("[]").unwrap();
        assert!(none.into_text().is_none());
    }

    #[test]
    fn trailing_slash_in_base_is_trimmed() {
        let generator = HuggingFaceGenerator::new("k", "http://localhost:9000/", "m");
        assert_eq!(generator.api_base, "http://localhost:9000");
    }
}
