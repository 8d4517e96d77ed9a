use axum::{
    extract::{DefaultBodyLimit, Multipart},
    http::StatusCode,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    ctx::FileParams,
    openapi::{
        aide::{
            axum::{routing::post_with, ApiRouter, IntoApiResponse},
            NoApi,
        },
        Json,
    },
    state::AppState,
    Error, Result,
};

use super::{detect_image, sanitize_file_name};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UploadResponse {
    pub url: String,
    pub file_path: String,
    pub file_name: String,
    /// Detected from the file content.
    pub file_type: String,
}

pub fn router(state: AppState) -> ApiRouter {
    let max_bytes = state.uploads.max_bytes();

    ApiRouter::new()
        .api_route(
            "/api/upload",
            post_with(upload, |t| {
                t.summary("Store one image (PNG, JPEG, GIF, WebP or BMP)")
                    .response::<201, Json<UploadResponse>>()
            }),
        )
        .layer(DefaultBodyLimit::max(max_bytes))
        .with_state(state)
}

async fn upload(NoApi(params): NoApi<FileParams>, multipart: Multipart) -> impl IntoApiResponse {
    store_first_file(params, multipart)
        .await
        .map(|r| (StatusCode::CREATED, Json(r)))
}

async fn store_first_file(FileParams { base, uploads }: FileParams, mut multipart: Multipart) -> Result<UploadResponse> {
    while let Some(field) = multipart.next_field().await? {
        let Some(original_name) = field.file_name().map(sanitize_file_name) else {
            continue;
        };

        let declared = field.content_type().unwrap_or("application/octet-stream").to_string();
        if !declared.starts_with("image/") {
            return Err(Error::validation(format!("Only image uploads are allowed, got {declared}")));
        }

        let data = field.bytes().await?;
        if data.is_empty() {
            return Err(Error::validation("Uploaded file is empty"));
        }

        let kind = detect_image(&data)
            .ok_or_else(|| Error::validation("File content is not a supported image"))?;
        if kind.mime_type != declared {
            tracing::debug!("upload declared as {} but detected {}", declared, kind.mime_type);
        }

        let stored = uploads.save(kind.extension, &data).await?;
        tracing::info!(
            device_id = %base.ctx.device_id(),
            "uploaded {} as {} ({} bytes)",
            original_name,
            stored.file_name,
            data.len()
        );

        return Ok(UploadResponse {
            url: stored.url(),
            file_path: stored.path.to_string_lossy().into_owned(),
            file_name: original_name,
            file_type: kind.mime_type.to_string(),
        });
    }

    Err(Error::validation("No file uploaded"))
}
