//! Local upload directory.
//!
//! Files are written under generated names (`<unix millis>-<random>.<ext>`) so
//! concurrent uploads never collide and no locking is needed. The extension
//! comes from the detected image type, never from the client. Every path
//! handed back by clients is re-validated against the root before it is
//! touched.

mod routes;

use std::path::{Component, Path, PathBuf};

use rand::Rng;
use tokio::{fs, io::AsyncWriteExt};

use crate::{Error, Result};

pub use routes::{router, UploadResponse};

/// URL prefix the upload directory is served under.
pub const PUBLIC_PREFIX: &str = "/uploads";

pub const DEFAULT_MAX_BYTES: usize = 10 * 1024 * 1024;

/// Raster formats accepted from clients, as detected from the file's magic bytes.
const IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp", "image/bmp"];

#[derive(Clone, Debug)]
pub struct Uploads {
    root: PathBuf,
    max_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub file_name: String,
    pub path: PathBuf,
}

impl StoredFile {
    pub fn url(&self) -> String {
        format!("{PUBLIC_PREFIX}/{}", self.file_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageKind {
    pub mime_type: &'static str,
    pub extension: &'static str,
}

/// Content-based detection; the declared type and file name are not trusted.
pub fn detect_image(data: &[u8]) -> Option<ImageKind> {
    infer::get(data)
        .filter(|kind| IMAGE_TYPES.contains(&kind.mime_type()))
        .map(|kind| ImageKind {
            mime_type: kind.mime_type(),
            extension: kind.extension(),
        })
}

impl Uploads {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Request body limit for `POST /api/upload`.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub async fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        tracing::info!("upload directory ready at {:?}", self.root);
        Ok(())
    }

    /// Writes `data` under a fresh name ending in `extension`.
    pub async fn save(&self, extension: &str, data: &[u8]) -> Result<StoredFile> {
        fs::create_dir_all(&self.root).await?;

        let file_name = generate_file_name(extension);
        let path = self.root.join(&file_name);
        let temp_path = self.root.join(format!(".{file_name}.part"));

        write_atomically(&temp_path, &path, data).await?;

        tracing::debug!("stored upload {} ({} bytes)", file_name, data.len());

        Ok(StoredFile { file_name, path })
    }

    /// Maps a client-supplied reference (`/uploads/x.png`, `uploads/x.png`, `x.png`
    /// or a path already under the root) to a file inside the root.
    pub fn resolve(&self, reference: &str) -> Result<StoredFile> {
        let reference = reference.trim();
        let candidate = Path::new(reference);

        let relative = if let Ok(rest) = candidate.strip_prefix(&self.root) {
            rest.to_path_buf()
        } else {
            let trimmed = reference
                .strip_prefix(PUBLIC_PREFIX)
                .or_else(|| reference.strip_prefix(&PUBLIC_PREFIX[1..]))
                .unwrap_or(reference);
            PathBuf::from(trimmed.trim_start_matches('/'))
        };

        let mut components = relative.components();
        let file_name = match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => name.to_str().map(str::to_string),
            _ => None,
        }
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::validation(format!("Invalid file path: {reference}")))?;

        Ok(StoredFile {
            path: self.root.join(&file_name),
            file_name,
        })
    }

    /// Best-effort unlink. A missing file is not an error.
    pub async fn remove(&self, reference: &str) -> Result<bool> {
        let stored = self.resolve(reference)?;
        match fs::remove_file(&stored.path).await {
            Ok(()) => {
                tracing::debug!("removed upload {}", stored.file_name);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// The temp file never outlives a failed write.
async fn write_atomically(temp_path: &Path, path: &Path, data: &[u8]) -> std::io::Result<()> {
    let written = match write_file(temp_path, data).await {
        Ok(()) => fs::rename(temp_path, path).await,
        Err(e) => Err(e),
    };

    if let Err(e) = written {
        match fs::remove_file(temp_path).await {
            Err(cleanup) if cleanup.kind() != std::io::ErrorKind::NotFound => {
                tracing::warn!("could not remove partial upload {:?}: {}", temp_path, cleanup)
            }
            _ => {}
        }
        return Err(e);
    }

    Ok(())
}

async fn write_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}

fn generate_file_name(extension: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{millis}-{suffix}{}", clean_extension(extension))
}

fn clean_extension(extension: &str) -> String {
    Some(extension.trim_start_matches('.'))
        .filter(|ext| !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Strips path separators and control characters from a client file name.
pub fn sanitize_file_name(file_name: &str) -> String {
    let name = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control())
        .take(255)
        .collect::<String>();

    if name.trim().is_empty() {
        "file".into()
    } else {
        name
    }
}
