use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::web::error::AppError;

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

#[derive(Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub extension: String,
    pub bytes: Vec<u8>,
}

/// Decodes `data:image/<ext>;base64,<payload>`.
pub fn decode_data_url(data_url: &str) -> Result<DecodedImage, AppError> {
    let invalid = || AppError::validation("image", "Upload a valid image.");

    let (header, payload) = data_url.split_once(";base64,").ok_or_else(invalid)?;
    let mime = header.strip_prefix("data:").ok_or_else(invalid)?;
    let extension = mime
        .strip_prefix("image/")
        .map(|ext| ext.to_ascii_lowercase())
        .ok_or_else(invalid)?;
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(invalid());
    }

    let bytes = STANDARD.decode(payload.trim()).map_err(|_| invalid())?;
    if bytes.is_empty() {
        return Err(invalid());
    }

    Ok(DecodedImage { extension, bytes })
}

/// Stores recipe images below `media_dir` and keeps paths relative to it.
#[derive(Debug, Clone)]
pub struct ImageStore {
    media_dir: PathBuf,
}

impl ImageStore {
    pub fn new(media_dir: impl AsRef<Path>) -> Self {
        ImageStore {
            media_dir: media_dir.as_ref().to_path_buf(),
        }
    }

    /// Writes the decoded image and returns its path relative to the media directory.
    pub async fn save(&self, image: &DecodedImage) -> Result<String, AppError> {
        let relative = format!("recipes/{}.{}", Uuid::new_v4(), image.extension);
        let full_path = self.media_dir.join(&relative);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::InternalServerError(format!("Failed to create media directory: {e}"))
            })?;
        }
        tokio::fs::write(&full_path, &image.bytes)
            .await
            .map_err(|e| AppError::InternalServerError(format!("Failed to write image: {e}")))?;
        debug!(path = %full_path.display(), size = image.bytes.len(), "Stored recipe image.");
        Ok(relative)
    }

    pub async fn remove(&self, relative: &str) {
        let full_path = self.media_dir.join(relative);
        if let Err(e) = tokio::fs::remove_file(&full_path).await {
            warn!(path = %full_path.display(), error = %e, "Failed to remove recipe image.");
        }
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_data_url() {
        let image = decode_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(image.extension, "png");
        assert_eq!(image.bytes, b"hello");
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in [
            "aGVsbG8=",
            "data:text/plain;base64,aGVsbG8=",
            "data:image/png,aGVsbG8=",
            "data:image/png;base64,***",
            "data:image/png;base64,",
            "data:image/svg+xml;base64,aGVsbG8=",
        ] {
            assert!(decode_data_url(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[tokio::test]
    async fn save_and_remove_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let image = decode_data_url("data:image/jpeg;base64,aGVsbG8=").unwrap();

        let relative = store.save(&image).await.unwrap();
        assert!(relative.starts_with("recipes/") && relative.ends_with(".jpeg"));
        let full = dir.path().join(&relative);
        assert_eq!(std::fs::read(&full).unwrap(), b"hello");

        store.remove(&relative).await;
        assert!(!full.exists());
    }
}
