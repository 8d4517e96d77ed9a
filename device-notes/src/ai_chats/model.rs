use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai::ChatMessage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AiChat {
    pub id: Uuid,
    pub note_id: Uuid,
    pub device_id: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CreateChat {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Replaces the whole transcript; callers send the full accumulated history.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpdateChat {
    pub messages: Vec<ChatMessage>,
}
