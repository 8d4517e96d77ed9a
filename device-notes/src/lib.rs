pub mod ai;
pub mod ai_chats;
pub mod app;
pub mod attachments;
pub mod client;
pub mod config;
pub mod ctx;
pub mod db;
pub mod errors;
pub mod notes;
pub mod openapi;
pub mod state;
pub mod tracing;
pub mod uploads;

use openapi::aide::axum::ApiRouter;
use state::AppState;

pub use config::config;
pub use db::{init_db, DB};
pub use errors::{Error, Result};

/// Every `/api` route the service exposes.
pub fn api_router(state: AppState) -> ApiRouter {
    ApiRouter::new()
        .merge(notes::router(state.clone()))
        .merge(ai_chats::router(state.clone()))
        .merge(attachments::router(state.clone()))
        .merge(uploads::router(state.clone()))
        .merge(ai::router(state))
}
