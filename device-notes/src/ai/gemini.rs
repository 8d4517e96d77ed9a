//! Google Generative Language (`generateContent`) backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Config;

use super::{ChatMessage, Error, Result, Role, TextGenerator};

/// Keeps the key out of the request URL, which reqwest echoes in its errors.
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_seconds: u64,
}

impl From<&Config> for GeminiConfig {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.gemini_base_url.clone(),
            api_key: config.gemini_api_key.clone().filter(|key| !key.trim().is_empty()),
            model: config.gemini_model.clone(),
            timeout_seconds: config.ai_timeout_secs,
        }
    }
}

pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Request(format!("failed to create HTTP client: {e}")))?;

        if config.api_key.is_none() {
            tracing::warn!("GEMINI_API_KEY is not set, AI endpoints will fail");
        }
        tracing::info!("AI backend: url={}, model={}", config.base_url, config.model);

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiBackend {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let api_key = self.config.api_key.as_deref().ok_or(Error::NotConfigured)?;
        let request = GenerateContentRequest::from_messages(messages);

        tracing::debug!(
            "generating with {} ({} messages)",
            self.config.model,
            request.contents.len()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Request(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| format!("AI provider returned {status}"));
            tracing::warn!("AI provider error {}: {}", status, message);
            return Err(Error::Provider(message));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::Request(format!("invalid provider response: {}", e.without_url())))?;

        body.text().ok_or(Error::EmptyResponse)
    }
}

// Wire types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ProviderError,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    message: String,
}

impl GenerateContentRequest {
    /// System messages are folded into `systemInstruction`; `assistant` is `model` on the wire.
    fn from_messages(messages: &[ChatMessage]) -> Self {
        let system = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>();

        let contents = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| Content {
                role: Some(
                    match m.role {
                        Role::Assistant => "model",
                        _ => "user",
                    }
                    .to_string(),
                ),
                parts: vec![Part {
                    text: m.content.clone(),
                }],
            })
            .collect();

        Self {
            contents,
            system_instruction: (!system.is_empty()).then(|| Content {
                role: None,
                parts: vec![Part {
                    text: system.join("\n\n"),
                }],
            }),
        }
    }
}

impl GenerateContentResponse {
    fn text(&self) -> Option<String> {
        let text = self
            .candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<String>();

        (!text.trim().is_empty()).then_some(text)
    }
}
