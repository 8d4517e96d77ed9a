use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Attachment {
    pub id: Uuid,
    pub note_id: Uuid,
    pub device_id: String,
    /// Location inside the upload directory.
    pub file_path: String,
    pub file_type: String,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
}

/// Binds a file previously returned by `POST /api/upload` to a note.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateAttachment {
    /// Either the upload's `url` or its `file_path`.
    pub file_path: String,
    pub file_type: String,
    pub file_name: String,
}
