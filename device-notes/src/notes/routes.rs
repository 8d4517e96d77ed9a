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
    Error,
};
use axum::http::StatusCode;

use schemars::JsonSchema;

use serde::Deserialize;
use uuid::Uuid;

use super::{handlers, CreateNote, Note, UpdateNote};

#[derive(Debug, Deserialize, JsonSchema)]
struct NoteIdPath {
    note_id: Uuid,
}

pub fn router(state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/api/notes",
            get_with(list_notes, |t| t.summary("List the device's notes, most recently modified first"))
                .post_with(create_note, |t| t.response::<201, Json<Note>>()),
        )
        .api_route(
            "/api/notes/{note_id}",
            get_with(get_note, |t| t.summary("Fetch one note"))
                .put_with(update_note, |t| t.summary("Apply a partial update"))
                .delete_with(delete_note, |t| t.summary("Soft-delete a note").response::<204, ()>()),
        )
        .with_state(state)
}

async fn list_notes(NoApi(base): NoApi<BaseParams>) -> impl IntoApiResponse {
    handlers::list_notes(base).await.map(Json)
}

async fn create_note(NoApi(base): NoApi<BaseParams>, Json(args): Json<CreateNote>) -> impl IntoApiResponse {
    handlers::create_note(args, base)
        .await
        .map(|r| (StatusCode::CREATED, Json(r)))
}

async fn get_note(
    Path(NoteIdPath { note_id }): Path<NoteIdPath>,
    NoApi(base): NoApi<BaseParams>,
) -> impl IntoApiResponse {
    handlers::get_note(note_id, base).await.map(Json)
}

async fn update_note(
    Path(NoteIdPath { note_id }): Path<NoteIdPath>,
    NoApi(base): NoApi<BaseParams>,
    Json(args): Json<UpdateNote>,
) -> impl IntoApiResponse {
    handlers::update_note(note_id, args, base).await.map(Json)
}

async fn delete_note(
    Path(NoteIdPath { note_id }): Path<NoteIdPath>,
    NoApi(base): NoApi<BaseParams>,
) -> impl IntoApiResponse {
    match handlers::delete_note(note_id, base).await {
        Ok(true) => Ok((StatusCode::NO_CONTENT, ())),
        Ok(false) => Err(Error::NotFound("Note not found".into())),
        Err(e) => Err(e),
    }
}
