use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    ctx::AiParams,
    notes::handlers::{get_note, list_notes},
    openapi::{
        aide::{
            axum::{routing::post_with, ApiRouter},
            NoApi,
        },
        Json, Path,
    },
    state::AppState,
    Error, Result,
};

use super::{prompts, ChatMessage};

#[derive(Debug, Deserialize, JsonSchema)]
struct NoteIdPath {
    note_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DashboardChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenerateResponse {
    pub text: String,
}

pub fn router(state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/api/notes/{note_id}/ai/generate",
            post_with(generate_for_note, |t| t.summary("Ask the assistant about one note")),
        )
        .api_route(
            "/api/ai/dashboard-chat",
            post_with(dashboard_chat, |t| t.summary("Ask the assistant about all of the device's notes")),
        )
        .with_state(state)
}

fn required(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{field} is required")));
    }
    Ok(())
}

async fn generate_for_note(
    Path(NoteIdPath { note_id }): Path<NoteIdPath>,
    NoApi(AiParams { base, generator }): NoApi<AiParams>,
    Json(args): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>> {
    required(&args.prompt, "prompt")?;

    let device_id = base.ctx.device_id().clone();
    let note = get_note(note_id, base).await?;
    let messages = prompts::note_messages(&note, &args.prompt, &args.history);

    let text = generator.generate(&messages).await.inspect_err(|e| {
        tracing::warn!(%device_id, %note_id, "note generation failed: {e}");
    })?;

    Ok(Json(GenerateResponse { text }))
}

async fn dashboard_chat(
    NoApi(AiParams { base, generator }): NoApi<AiParams>,
    Json(args): Json<DashboardChatRequest>,
) -> Result<Json<GenerateResponse>> {
    required(&args.message, "message")?;

    let device_id = base.ctx.device_id().clone();
    let notes = list_notes(base).await?;
    let messages = prompts::dashboard_messages(&notes, &args.message, &args.history);

    let text = generator.generate(&messages).await.inspect_err(|e| {
        tracing::warn!(%device_id, notes = notes.len(), "dashboard chat failed: {e}");
    })?;

    Ok(Json(GenerateResponse { text }))
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderName, HeaderValue};
    use serde_json::json;

    use super::GenerateResponse;
    use crate::{
        ai::{mock::MockGenerator, ChatMessage, Role},
        ctx::DEVICE_ID_HEADER,
        db::init_test_db,
        errors::{ErrorResponse, Result},
        notes::{self, Note},
        state::AppState,
        tests::TestApp,
    };

    fn device(id: &'static str) -> (HeaderName, HeaderValue) {
        (HeaderName::from_static(DEVICE_ID_HEADER), HeaderValue::from_static(id))
    }

    fn router(state: AppState) -> crate::openapi::aide::axum::ApiRouter {
        notes::router(state.clone()).merge(super::router(state))
    }

    async fn create_note(app: &TestApp, device_id: &'static str, title: &str, content: &str) -> Note {
        let (name, value) = device(device_id);
        app.server
            .post("/api/notes")
            .add_header(name, value)
            .json(&json!({ "title": title, "content": content }))
            .await
            .json::<Note>()
    }

    #[tokio::test]
    async fn generate_for_note_uses_note_as_context() -> Result<()> {
        let generator = MockGenerator::with_response("Buy oat milk instead.");
        let app = TestApp::with_generator(init_test_db().await?, router, generator.clone()).await?;
        let note = create_note(&app, "dev1", "Shopping", "<p>milk &amp; eggs</p>").await;

        let (name, value) = device("dev1");
        let response = app
            .server
            .post(&format!("/api/notes/{}/ai/generate", note.id))
            .add_header(name, value)
            .json(&json!({
                "prompt": "Any suggestions?",
                "history": [{ "role": "user", "content": "hello" }, { "role": "assistant", "content": "hi" }]
            }))
            .await;

        assert_eq!(response.status_code(), 200);
        assert_eq!(response.json::<GenerateResponse>().text, "Buy oat milk instead.");

        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        let messages = &calls[0];
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Shopping"));
        assert!(messages[0].content.contains("milk & eggs"));
        assert!(!messages[0].content.contains("<p>"));
        assert_eq!(messages[1], ChatMessage::user("hello"));
        assert_eq!(messages[2], ChatMessage::assistant("hi"));
        assert_eq!(messages.last(), Some(&ChatMessage::user("Any suggestions?")));
        Ok(())
    }

    #[tokio::test]
    async fn generate_for_foreign_note_is_404() -> Result<()> {
        let generator = MockGenerator::new();
        let app = TestApp::with_generator(init_test_db().await?, router, generator.clone()).await?;
        let note = create_note(&app, "dev1", "Private", "<p>secret</p>").await;

        let (name, value) = device("dev2");
        let response = app
            .server
            .post(&format!("/api/notes/{}/ai/generate", note.id))
            .add_header(name, value)
            .json(&json!({ "prompt": "leak it" }))
            .await;

        assert_eq!(response.status_code(), 404);
        assert!(generator.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn provider_failure_is_500_with_message() -> Result<()> {
        let generator = MockGenerator::failing("quota exceeded");
        let app = TestApp::with_generator(init_test_db().await?, router, generator).await?;
        let note = create_note(&app, "dev1", "Plan", "<p>x</p>").await;

        let (name, value) = device("dev1");
        let response = app
            .server
            .post(&format!("/api/notes/{}/ai/generate", note.id))
            .add_header(name, value)
            .json(&json!({ "prompt": "summarize" }))
            .await;

        assert_eq!(response.status_code(), 500);
        assert_eq!(response.json::<ErrorResponse>().message.as_deref(), Some("quota exceeded"));
        Ok(())
    }

    #[tokio::test]
    async fn blank_prompt_is_400() -> Result<()> {
        let app = TestApp::new(init_test_db().await?, router).await?;
        let note = create_note(&app, "dev1", "Plan", "<p>x</p>").await;

        let (name, value) = device("dev1");
        let response = app
            .server
            .post(&format!("/api/notes/{}/ai/generate", note.id))
            .add_header(name, value)
            .json(&json!({ "prompt": "  " }))
            .await;

        assert_eq!(response.status_code(), 400);
        Ok(())
    }

    #[tokio::test]
    async fn dashboard_chat_sees_only_own_notes() -> Result<()> {
        let generator = MockGenerator::with_response("You have two notes.");
        let app = TestApp::with_generator(init_test_db().await?, router, generator.clone()).await?;
        create_note(&app, "dev1", "Groceries", "<p>bread</p>").await;
        create_note(&app, "dev1", "Workout", "<p>run 5k</p>").await;
        create_note(&app, "dev2", "Diary", "<p>not yours</p>").await;

        let (name, value) = device("dev1");
        let response = app
            .server
            .post("/api/ai/dashboard-chat")
            .add_header(name, value)
            .json(&json!({ "message": "What do I have?" }))
            .await;

        assert_eq!(response.status_code(), 200);
        assert_eq!(response.json::<GenerateResponse>().text, "You have two notes.");

        let calls = generator.calls();
        let system = &calls[0][0].content;
        assert!(system.contains("Groceries"));
        assert!(system.contains("run 5k"));
        assert!(!system.contains("Diary"));
        assert_eq!(calls[0].last(), Some(&ChatMessage::user("What do I have?")));
        Ok(())
    }
}
