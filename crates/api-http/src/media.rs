//! Uploaded side-effect images on the local filesystem

use crate::error::ApiError;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

const SIDE_EFFECT_DIR: &str = "side_effects";
const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

pub struct MediaStore {
    root: PathBuf,
    max_upload_bytes: usize,
}

impl MediaStore {
    pub fn new(root: PathBuf, max_upload_bytes: usize) -> Self {
        Self {
            root,
            max_upload_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Store an image and return its path relative to the media root
    pub async fn save_side_effect_image(
        &self,
        file_name: Option<&str>,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, ApiError> {
        if bytes.is_empty() {
            return Err(ApiError::BadRequest(
                "image: The submitted file is empty.".to_string(),
            ));
        }
        if bytes.len() > self.max_upload_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "image: File exceeds the {} byte limit.",
                self.max_upload_bytes
            )));
        }

        let extension = image_extension(file_name, content_type).ok_or_else(|| {
            ApiError::UnsupportedMediaType(
                "image: Upload a valid image. The file you uploaded was either not an image or a corrupted image."
                    .to_string(),
            )
        })?;

        let dir = self.root.join(SIDE_EFFECT_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(medtrack_core::AppError::from)?;

        let relative = format!("{}/{}.{}", SIDE_EFFECT_DIR, Uuid::new_v4(), extension);
        tokio::fs::write(self.root.join(&relative), bytes)
            .await
            .map_err(medtrack_core::AppError::from)?;

        info!(path = %relative, size = bytes.len(), "Image stored");
        Ok(relative)
    }

    /// Best-effort cleanup of an image whose log was never written
    pub async fn discard(&self, relative: &str) {
        if let Err(e) = tokio::fs::remove_file(self.root.join(relative)).await {
            warn!(path = %relative, error = %e, "Failed to remove orphaned image");
        }
    }
}

/// Extension from the file name, falling back to the declared content type
fn image_extension(file_name: Option<&str>, content_type: Option<&str>) -> Option<&'static str> {
    if let Some(content_type) = content_type {
        if !content_type.starts_with("image/") {
            return None;
        }
    }

    let from_name = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    let candidate = match from_name {
        Some(ext) => ext,
        None => content_type?.trim_start_matches("image/").to_ascii_lowercase(),
    };

    IMAGE_EXTENSIONS
        .iter()
        .find(|allowed| **allowed == candidate)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_from_name_or_type() {
        assert_eq!(image_extension(Some("rash.PNG"), None), Some("png"));
        assert_eq!(image_extension(None, Some("image/jpeg")), Some("jpeg"));
        assert_eq!(image_extension(Some("notes.txt"), Some("image/png")), None);
        assert_eq!(image_extension(Some("rash.png"), Some("text/plain")), None);
        assert_eq!(image_extension(None, None), None);
    }

    #[tokio::test]
    async fn test_save_writes_under_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf(), 1024);

        let relative = store
            .save_side_effect_image(Some("rash.png"), Some("image/png"), b"\x89PNG")
            .await
            .unwrap();

        assert!(relative.starts_with("side_effects/"));
        assert!(relative.ends_with(".png"));
        let stored = std::fs::read(dir.path().join(&relative)).unwrap();
        assert_eq!(stored, b"\x89PNG");

        store.discard(&relative).await;
        assert!(!dir.path().join(&relative).exists());
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf(), 4);

        let err = store
            .save_side_effect_image(Some("big.png"), None, b"12345")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::PayloadTooLarge(_)));
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf(), 4);

        let err = store
            .save_side_effect_image(Some("a.png"), None, b"")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
