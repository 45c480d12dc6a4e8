//! Payment screenshot storage.
//!
//! Files are content addressed: the stored name is the SHA-256 of the bytes,
//! so re-uploading the same image does not create a second copy. The returned
//! path is relative to the upload root and is what gets persisted on the
//! payment row.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::errors::ServiceError;

const SCREENSHOT_DIR: &str = "payment_screenshots";
const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

/// An uploaded file as received from the multipart body.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Path relative to the upload root, using `/` separators.
    pub relative_path: String,
    absolute: PathBuf,
    /// False when an identical file already existed.
    created: bool,
}

#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    root: PathBuf,
    max_bytes: usize,
}

impl ScreenshotStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Checks size and type without touching the disk.
    pub fn validate(&self, upload: &Upload) -> Result<&'static str, ServiceError> {
        if upload.bytes.is_empty() {
            return Err(ServiceError::ValidationError(
                "Screenshot file is empty".to_string(),
            ));
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(ServiceError::ValidationError(format!(
                "Screenshot exceeds the {} byte limit",
                self.max_bytes
            )));
        }
        image_extension(upload).ok_or_else(|| {
            ServiceError::ValidationError(
                "Screenshot must be a png, jpeg, webp or gif image".to_string(),
            )
        })
    }

    pub async fn store(&self, upload: &Upload) -> Result<StoredFile, ServiceError> {
        let extension = self.validate(upload)?;
        let digest = hex::encode(Sha256::digest(&upload.bytes));
        let file_name = format!("{digest}.{extension}");

        let dir = self.root.join(SCREENSHOT_DIR);
        tokio::fs::create_dir_all(&dir).await?;
        let absolute = dir.join(&file_name);

        let created = if tokio::fs::try_exists(&absolute).await? {
            false
        } else {
            tokio::fs::write(&absolute, &upload.bytes).await?;
            true
        };
        debug!(path = %absolute.display(), created, "screenshot stored");

        Ok(StoredFile {
            relative_path: format!("{SCREENSHOT_DIR}/{file_name}"),
            absolute,
            created,
        })
    }

    /// Removes a file written by [`store`](Self::store) when the surrounding
    /// transaction did not commit. Files that already existed are kept.
    pub async fn discard(&self, stored: &StoredFile) {
        if !stored.created {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(&stored.absolute).await {
            warn!(path = %stored.absolute.display(), error = %e, "failed to remove orphaned screenshot");
        }
    }
}

fn image_extension(upload: &Upload) -> Option<&'static str> {
    let from_type = upload
        .content_type
        .as_deref()
        .and_then(|ct| match ct.to_ascii_lowercase().as_str() {
            "image/png" => Some("png"),
            "image/jpeg" | "image/jpg" => Some("jpg"),
            "image/webp" => Some("webp"),
            "image/gif" => Some("gif"),
            _ => None,
        });
    if from_type.is_some() {
        return from_type;
    }

    let ext = Path::new(upload.file_name.as_deref()?)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .iter()
        .find(|allowed| **allowed == ext)
        .map(|allowed| if *allowed == "jpeg" { "jpg" } else { *allowed })
}
