//! Uploaded media storage
//!
//! Attraction photos are written to `<media_root>/attraction_photos/` under
//! a random name. Only the relative path is stored in the database.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::fs;
use uuid::Uuid;

/// Subdirectory of the media root holding attraction photos
pub const PHOTO_DIR: &str = "attraction_photos";

/// Files under the configured media root
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store a photo, returning its path relative to the media root.
    pub async fn save_photo(&self, extension: &str, data: &[u8]) -> Result<String> {
        let dir = self.root.join(PHOTO_DIR);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create media directory {}", dir.display()))?;

        let filename = format!("{}.{}", Uuid::new_v4(), extension);
        let path = dir.join(&filename);
        fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::debug!("Stored photo {} ({} bytes)", filename, data.len());
        Ok(format!("{}/{}", PHOTO_DIR, filename))
    }

    /// Delete a stored photo. Failures are logged and otherwise ignored.
    pub async fn remove(&self, relative: &str) {
        let Some(path) = self.resolve(relative) else {
            tracing::warn!("Refusing to remove media outside the photo directory: {}", relative);
            return;
        };

        match fs::remove_file(&path).await {
            Ok(()) => tracing::debug!("Removed photo {}", relative),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove photo {}: {}", path.display(), e),
        }
    }

    /// Absolute path of a stored photo; `None` for anything outside `PHOTO_DIR`.
    fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let name = relative.strip_prefix(PHOTO_DIR)?.strip_prefix('/')?;
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return None;
        }
        Some(self.root.join(PHOTO_DIR).join(name))
    }
}
