use crate::error::AppError;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Owner of the local handles photos point at.
///
/// `resolve` reads the bytes back (payload rehydration after a restart),
/// `revoke` releases the handle once the photo leaves the draft.
pub trait LocalUriRegistry: Send + Sync {
    fn resolve(&self, uri: &str) -> Option<Vec<u8>>;
    fn revoke(&self, uri: &str);
}

/// Captured photos kept as files under the app data directory
#[derive(Debug, Clone)]
pub struct CaptureCache {
    dir: PathBuf,
}

impl CaptureCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes a capture and returns its local URI
    pub fn store(&self, bytes: &[u8], extension: &str) -> Result<String, AppError> {
        fs::create_dir_all(&self.dir)?;
        let file_name = format!("{}.{}", Uuid::new_v4(), extension.trim_start_matches('.'));
        let path = self.dir.join(&file_name);
        fs::write(&path, bytes)?;
        log::debug!("Stored capture {} ({} bytes)", path.display(), bytes.len());
        Ok(path.to_string_lossy().into_owned())
    }

    /// Only files inside the cache directory are touched
    fn owned_path(&self, uri: &str) -> Option<PathBuf> {
        let path = PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri));
        path.starts_with(&self.dir).then_some(path)
    }
}

impl LocalUriRegistry for CaptureCache {
    fn resolve(&self, uri: &str) -> Option<Vec<u8>> {
        let path = self.owned_path(uri)?;
        match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::warn!("Capture {} unavailable: {}", path.display(), e);
                None
            }
        }
    }

    fn revoke(&self, uri: &str) {
        let Some(path) = self.owned_path(uri) else {
            log::debug!("Not revoking foreign uri {}", uri);
            return;
        };
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove capture {}: {}", path.display(), e);
            }
        }
    }
}
