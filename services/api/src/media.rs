//! Storage of uploaded recipe images on the local filesystem

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Public URL prefix the media root is served under
pub const MEDIA_URL: &str = "/media";

/// Directory below the media root that holds recipe images
const RECIPE_DIR: &str = "recipe";

const KNOWN_EXTENSIONS: [&str; 5] = [".png", ".jpg", ".jpeg", ".gif", ".webp"];

/// Public URL of a stored file
pub fn media_url(path: &str) -> String {
    format!("{}/{}", MEDIA_URL, path)
}

/// Sniff the image format from its leading bytes
pub fn detect_image_extension(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some(".png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(".jpg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some(".gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some(".webp")
    } else {
        None
    }
}

/// Extension of an uploaded filename, lower-cased, when it is a known image one
fn filename_extension(filename: &str) -> Option<String> {
    let extension = Path::new(filename).extension()?.to_str()?.to_lowercase();
    let extension = format!(".{}", extension);
    KNOWN_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

/// Writes uploads below a media root
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    max_upload_bytes: usize,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>, max_upload_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_upload_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Largest accepted upload request body
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Store a recipe image under a fresh name
    ///
    /// Returns the path relative to the media root, `recipe/<uuid><ext>`, or
    /// `None` when the bytes are not a recognised image.
    pub async fn save_recipe_image(
        &self,
        filename: Option<&str>,
        bytes: &[u8],
    ) -> Result<Option<String>> {
        let Some(detected) = detect_image_extension(bytes) else {
            return Ok(None);
        };
        let extension = filename
            .and_then(filename_extension)
            .unwrap_or_else(|| detected.to_string());

        let relative = format!("{}/{}{}", RECIPE_DIR, Uuid::new_v4(), extension);
        let directory = self.root.join(RECIPE_DIR);

        tokio::fs::create_dir_all(&directory)
            .await
            .with_context(|| format!("Failed to create {}", directory.display()))?;

        let target = self.root.join(&relative);
        tokio::fs::write(&target, bytes)
            .await
            .with_context(|| format!("Failed to write {}", target.display()))?;

        info!("Stored recipe image {} ({} bytes)", relative, bytes.len());
        Ok(Some(relative))
    }
}
