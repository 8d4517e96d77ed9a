use axum::http::StatusCode;
use schemars::JsonSchema;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    ctx::BaseParams,
    openapi::{
        aide::{
            axum::{routing::get_with, ApiRouter, IntoApiResponse},
            NoApi,
        },
        Json, Path,
    },
    state::AppState,
};

use super::{handlers, AiChat, CreateChat, UpdateChat};

#[derive(Debug, Deserialize, JsonSchema)]
struct NoteIdPath {
    note_id: Uuid,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ChatIdPath {
    chat_id: Uuid,
}

pub fn router(state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/api/notes/{note_id}/ai-chats",
            get_with(list_chats, |t| t.summary("List a note's chat threads, newest first"))
                .post_with(create_chat, |t| t.response::<201, Json<AiChat>>()),
        )
        .api_route(
            "/api/ai-chats/{chat_id}",
            get_with(get_chat, |t| t.summary("Fetch a chat thread"))
                .put_with(update_chat, |t| t.summary("Replace a chat thread's messages")),
        )
        .with_state(state)
}

async fn list_chats(
    Path(NoteIdPath { note_id }): Path<NoteIdPath>,
    NoApi(base): NoApi<BaseParams>,
) -> impl IntoApiResponse {
    handlers::list_chats(note_id, base).await.map(Json)
}

async fn create_chat(
    Path(NoteIdPath { note_id }): Path<NoteIdPath>,
    NoApi(base): NoApi<BaseParams>,
    Json(args): Json<CreateChat>,
) -> impl IntoApiResponse {
    handlers::create_chat(note_id, args.messages, base)
        .await
        .map(|r| (StatusCode::CREATED, Json(r)))
}

async fn get_chat(
    Path(ChatIdPath { chat_id }): Path<ChatIdPath>,
    NoApi(base): NoApi<BaseParams>,
) -> impl IntoApiResponse {
    handlers::get_chat(chat_id, base).await.map(Json)
}

async fn update_chat(
    Path(ChatIdPath { chat_id }): Path<ChatIdPath>,
    NoApi(base): NoApi<BaseParams>,
    Json(args): Json<UpdateChat>,
) -> impl IntoApiResponse {
    handlers::update_chat(chat_id, args.messages, base).await.map(Json)
}
