//! Typed HTTP client for the notes API.
//!
//! Identity travels with each [`NotesClient`] through its [`Session`]; there is
//! no process-wide token. Two clients with different sessions can be used side
//! by side.

use reqwest::{header::HeaderMap, multipart, Client, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::{
    ai::{ChatMessage, DashboardChatRequest, GenerateRequest, GenerateResponse},
    ai_chats::{AiChat, CreateChat, UpdateChat},
    attachments::{Attachment, CreateAttachment},
    ctx::DEVICE_ID_HEADER,
    errors::ErrorResponse,
    notes::{CreateNote, Note, UpdateNote},
    uploads::UploadResponse,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid session: {0}")]
    Session(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{status}: {}", api_message(.body))]
    Api { status: StatusCode, body: ErrorResponse },
}

fn api_message(body: &ErrorResponse) -> &str {
    body.message.as_deref().unwrap_or(&body.error)
}

impl Error {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status(),
            Error::Session(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Who the client is acting as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub device_id: String,
    /// Sent as `Authorization: Bearer` when present.
    pub token: Option<String>,
}

impl Session {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let device_id = self.device_id.trim();
        if device_id.is_empty() {
            return Err(Error::Session("device id is empty".into()));
        }
        headers.insert(
            DEVICE_ID_HEADER,
            device_id.parse().map_err(|_| Error::Session("device id is not a valid header value".into()))?,
        );
        if let Some(token) = &self.token {
            headers.insert(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {token}")
                    .parse()
                    .map_err(|_| Error::Session("token is not a valid header value".into()))?,
            );
        }
        Ok(headers)
    }
}

#[derive(Debug, Clone)]
pub struct NotesClient {
    http: Client,
    base_url: String,
    session: Session,
}

impl NotesClient {
    pub fn new(base_url: impl Into<String>, session: Session) -> Result<Self> {
        Self::with_client(Client::new(), base_url, session)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>, session: Session) -> Result<Self> {
        session.headers()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Same connection pool, different identity.
    pub fn with_session(&self, session: Session) -> Result<Self> {
        Self::with_client(self.http.clone(), self.base_url.clone(), session)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        Ok(self
            .http
            .request(method, format!("{}{path}", self.base_url))
            .headers(self.session.headers()?))
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.json::<ErrorResponse>().await.unwrap_or_else(|_| ErrorResponse {
            error: status.canonical_reason().unwrap_or("error").to_string(),
            message: None,
            status: status.as_u16(),
        });
        Err(Error::Api { status, body })
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        Ok(self.send(request).await?.json::<T>().await?)
    }

    async fn json_with<B: Serialize, T: DeserializeOwned>(&self, method: Method, path: &str, body: &B) -> Result<T> {
        self.json(self.request(method, path)?.json(body)).await
    }

    // notes

    pub async fn list_notes(&self) -> Result<Vec<Note>> {
        self.json(self.request(Method::GET, "/api/notes")?).await
    }

    pub async fn get_note(&self, note_id: Uuid) -> Result<Note> {
        self.json(self.request(Method::GET, &format!("/api/notes/{note_id}"))?).await
    }

    pub async fn create_note(&self, note: &CreateNote) -> Result<Note> {
        self.json_with(Method::POST, "/api/notes", note).await
    }

    pub async fn update_note(&self, note_id: Uuid, update: &UpdateNote) -> Result<Note> {
        self.json_with(Method::PUT, &format!("/api/notes/{note_id}"), update).await
    }

    pub async fn delete_note(&self, note_id: Uuid) -> Result<()> {
        self.send(self.request(Method::DELETE, &format!("/api/notes/{note_id}"))?).await?;
        Ok(())
    }

    // chats

    pub async fn list_chats(&self, note_id: Uuid) -> Result<Vec<AiChat>> {
        self.json(self.request(Method::GET, &format!("/api/notes/{note_id}/ai-chats"))?).await
    }

    pub async fn create_chat(&self, note_id: Uuid, messages: Vec<ChatMessage>) -> Result<AiChat> {
        self.json_with(Method::POST, &format!("/api/notes/{note_id}/ai-chats"), &CreateChat { messages })
            .await
    }

    pub async fn get_chat(&self, chat_id: Uuid) -> Result<AiChat> {
        self.json(self.request(Method::GET, &format!("/api/ai-chats/{chat_id}"))?).await
    }

    pub async fn update_chat(&self, chat_id: Uuid, messages: Vec<ChatMessage>) -> Result<AiChat> {
        self.json_with(Method::PUT, &format!("/api/ai-chats/{chat_id}"), &UpdateChat { messages })
            .await
    }

    // files

    pub async fn upload_image(&self, file_name: &str, mime_type: &str, data: Vec<u8>) -> Result<UploadResponse> {
        let part = multipart::Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(mime_type)?;
        let form = multipart::Form::new().part("image", part);

        self.json(self.request(Method::POST, "/api/upload")?.multipart(form)).await
    }

    pub async fn list_attachments(&self, note_id: Uuid) -> Result<Vec<Attachment>> {
        self.json(self.request(Method::GET, &format!("/api/notes/{note_id}/attachments"))?)
            .await
    }

    pub async fn create_attachment(&self, note_id: Uuid, attachment: &CreateAttachment) -> Result<Attachment> {
        self.json_with(Method::POST, &format!("/api/notes/{note_id}/attachments"), attachment)
            .await
    }

    pub async fn delete_attachment(&self, attachment_id: Uuid) -> Result<()> {
        self.send(self.request(Method::DELETE, &format!("/api/attachments/{attachment_id}"))?)
            .await?;
        Ok(())
    }

    // ai

    pub async fn generate_for_note(&self, note_id: Uuid, prompt: &str, history: Vec<ChatMessage>) -> Result<String> {
        let request = GenerateRequest {
            prompt: prompt.to_string(),
            history,
        };
        let response: GenerateResponse = self
            .json_with(Method::POST, &format!("/api/notes/{note_id}/ai/generate"), &request)
            .await?;
        Ok(response.text)
    }

    pub async fn dashboard_chat(&self, message: &str, history: Vec<ChatMessage>) -> Result<String> {
        let request = DashboardChatRequest {
            message: message.to_string(),
            history,
        };
        let response: GenerateResponse = self.json_with(Method::POST, "/api/ai/dashboard-chat", &request).await?;
        Ok(response.text)
    }
}
