//! On-disk storage for uploaded course files.
//!
//! Files land in a single flat directory as `<unix-millis><ext>` and are
//! served back read-only under `/uploads`. Nothing is written until a
//! handler has validated the rest of the request and calls [`UploadStore::save`].

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const ALLOWED_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif", "mp4", "mov", "avi", "pdf"];

const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "video/mp4",
    "video/quicktime",
    "video/x-msvideo",
    "video/avi",
    "application/pdf",
];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Invalid file type")]
    InvalidType,

    #[error("File too large")]
    TooLarge,

    #[error("Path traversal detected")]
    Traversal,

    #[error("Upload storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// A file part read from a multipart request, held in memory until saved.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    /// Lowercased extension of the client-supplied file name.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// Both the extension and the declared MIME type must be on the allow-list.
pub fn check_file_type(file_name: &str, content_type: Option<&str>) -> Result<(), UploadError> {
    let ext_ok = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| ALLOWED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    let mime_ok = content_type
        .map(|m| ALLOWED_MIME_TYPES.contains(&m.to_ascii_lowercase().as_str()))
        .unwrap_or(false);

    if ext_ok && mime_ok {
        Ok(())
    } else {
        Err(UploadError::InvalidType)
    }
}

/// Resolve `target` under `base`, rejecting anything that climbs out of it.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, UploadError> {
    let mut resolved = base.to_path_buf();
    for component in target.components() {
        match component {
            Component::Normal(c) => resolved.push(c),
            Component::CurDir => {}
            _ => return Err(UploadError::Traversal),
        }
    }
    if !resolved.starts_with(base) {
        return Err(UploadError::Traversal);
    }
    Ok(resolved)
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    base_path: PathBuf,
    max_size: usize,
}

impl UploadStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, UploadError> {
        fs::create_dir_all(&base_path).await?;

        info!(path = %base_path.display(), "Upload directory ready");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Write the file and return its stored name.
    pub async fn save(&self, file: &UploadedFile) -> Result<String, UploadError> {
        if file.bytes.len() > self.max_size {
            return Err(UploadError::TooLarge);
        }
        check_file_type(&file.file_name, file.content_type.as_deref())?;

        let ext = file
            .extension()
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let mut stamp = chrono::Utc::now().timestamp_millis();

        loop {
            let name = format!("{stamp}{ext}");
            let path = ensure_within(&self.base_path, Path::new(&name))?;

            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut out) => {
                    out.write_all(&file.bytes).await?;
                    out.flush().await?;
                    debug!(field = %file.field, name = %name, size = file.bytes.len(), "Stored upload");
                    return Ok(name);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => stamp += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
