//! Text generation behind a narrow `generate(messages) -> text` interface.
//!
//! Calls are single-shot: no retry, no backoff. A failure is returned to the
//! caller as-is and surfaces as a 500 with the provider's message.

pub mod gemini;
pub mod mock;
pub mod prompts;
mod routes;

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use routes::{router, DashboardChatRequest, GenerateRequest, GenerateResponse};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("AI provider is not configured")]
    NotConfigured,
    #[error("AI request failed: {0}")]
    Request(String),
    #[error("{0}")]
    Provider(String),
    #[error("AI provider returned no text")]
    EmptyResponse,
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String>;
}

pub type Generator = Arc<dyn TextGenerator>;
