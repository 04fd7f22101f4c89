//! Local storage for event images.
//!
//! Files land under `<root>/<user_id>/<unix_millis>-<suffix>.<ext>` and are
//! served back read-only below `/uploads`.

use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

pub const ALLOWED_CONTENT_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/gif",
];

const SUFFIX_LEN: usize = 7;
const MAX_EXTENSION_LEN: usize = 5;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Invalid file type. Please upload a JPEG, PNG, WebP, or GIF image.")]
    UnsupportedType(String),
    #[error("File size too large. Maximum size is {max_mb}MB.")]
    TooLarge { size: usize, max_mb: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedImage {
    pub url: String,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    public_base_url: String,
    max_bytes: usize,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Checks type and size without touching the disk.
    pub fn check(&self, content_type: &str, size: usize) -> Result<(), ImageError> {
        let content_type = content_type.trim().to_ascii_lowercase();
        if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(ImageError::UnsupportedType(content_type));
        }
        if size > self.max_bytes {
            return Err(ImageError::TooLarge {
                size,
                max_mb: self.max_bytes.div_ceil(1024 * 1024),
            });
        }
        Ok(())
    }

    pub async fn save(
        &self,
        user_id: Uuid,
        file_name: Option<&str>,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<UploadedImage, ImageError> {
        self.check(content_type, bytes.len())?;

        let extension = file_name
            .and_then(extension_from_name)
            .unwrap_or_else(|| extension_from_type(content_type).to_string());
        let suffix: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(SUFFIX_LEN)
            .collect();
        let path = format!(
            "{user_id}/{}-{suffix}.{extension}",
            Utc::now().timestamp_millis()
        );

        let target = self.root.join(&path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, bytes).await?;

        info!(%user_id, %path, size = bytes.len(), "image stored");

        Ok(UploadedImage {
            url: format!("{}/uploads/{path}", self.public_base_url),
            path,
        })
    }
}

fn extension_from_name(file_name: &str) -> Option<String> {
    let (_, extension) = file_name.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();

    let valid = !extension.is_empty()
        && extension.len() <= MAX_EXTENSION_LEN
        && extension.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(extension)
}

fn extension_from_type(content_type: &str) -> &'static str {
    match content_type.trim().to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "jpg",
    }
}
