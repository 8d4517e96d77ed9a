//! Deterministic generator for tests and offline runs.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{ChatMessage, Error, Result, TextGenerator};

#[derive(Clone)]
pub struct MockGenerator {
    response: std::result::Result<String, String>,
    calls: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::with_response("Mock response")
    }

    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            response: Ok(response.into()),
            calls: Arc::default(),
        }
    }

    /// Every call fails with `message` as the provider error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: Err(message.into()),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }

        self.response.clone().map_err(Error::Provider)
    }
}
