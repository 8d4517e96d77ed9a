use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

pub const DEFAULT_COLOR: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    /// Rich-text markup as produced by the editor.
    pub content: String,
    pub is_pinned: bool,
    pub tags: Vec<String>,
    pub color: String,
    pub device_id: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `is_deleted` and `device_id` in the body are ignored: new notes are always
/// live and owned by the requesting device.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateNote {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub is_pinned: Option<bool>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Omitted (or `null`) fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct UpdateNote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_pinned: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl CreateNote {
    pub fn validate(&self) -> Result<()> {
        validate_metadata(self.tags.as_deref(), self.color.as_deref())
    }
}

impl UpdateNote {
    pub fn validate(&self) -> Result<()> {
        validate_metadata(self.tags.as_deref(), self.color.as_deref())
    }
}

fn validate_metadata(tags: Option<&[String]>, color: Option<&str>) -> Result<()> {
    if tags.is_some_and(|tags| tags.iter().any(|tag| tag.trim().is_empty())) {
        return Err(Error::validation("Tags must not be empty"));
    }
    if color.is_some_and(|color| color.trim().is_empty()) {
        return Err(Error::validation("Color must not be empty"));
    }
    Ok(())
}
