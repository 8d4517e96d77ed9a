use axum::http::StatusCode;
use schemars::JsonSchema;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    ctx::{BaseParams, FileParams},
    openapi::{
        aide::{
            axum::{
                routing::{delete_with, get_with},
                ApiRouter, IntoApiResponse,
            },
            NoApi,
        },
        Json, Path,
    },
    state::AppState,
};

use super::{handlers, Attachment, CreateAttachment};

#[derive(Debug, Deserialize, JsonSchema)]
struct NoteIdPath {
    note_id: Uuid,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AttachmentIdPath {
    attachment_id: Uuid,
}

pub fn router(state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/api/notes/{note_id}/attachments",
            get_with(list_attachments, |t| t.summary("List a note's attachments, newest first"))
                .post_with(create_attachment, |t| {
                    t.summary("Bind an uploaded file to a note").response::<201, Json<Attachment>>()
                }),
        )
        .api_route(
            "/api/attachments/{attachment_id}",
            delete_with(delete_attachment, |t| {
                t.summary("Remove an attachment and its file").response::<204, ()>()
            }),
        )
        .with_state(state)
}

async fn list_attachments(
    Path(NoteIdPath { note_id }): Path<NoteIdPath>,
    NoApi(base): NoApi<BaseParams>,
) -> impl IntoApiResponse {
    handlers::list_attachments(note_id, base).await.map(Json)
}

async fn create_attachment(
    Path(NoteIdPath { note_id }): Path<NoteIdPath>,
    NoApi(params): NoApi<FileParams>,
    Json(args): Json<CreateAttachment>,
) -> impl IntoApiResponse {
    handlers::create_attachment(note_id, args, params)
        .await
        .map(|r| (StatusCode::CREATED, Json(r)))
}

async fn delete_attachment(
    Path(AttachmentIdPath { attachment_id }): Path<AttachmentIdPath>,
    NoApi(params): NoApi<FileParams>,
) -> impl IntoApiResponse {
    handlers::delete_attachment(attachment_id, params)
        .await
        .map(|_| (StatusCode::NO_CONTENT, ()))
}
