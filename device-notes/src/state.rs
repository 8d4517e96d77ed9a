use axum::extract::FromRef;

use crate::{ai::Generator, db::DB, uploads::Uploads};

#[derive(FromRef, Clone)]
pub struct AppState {
    pub conn: DB,
    pub uploads: Uploads,
    pub generator: Generator,
}
