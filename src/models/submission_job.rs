use super::PhotoItem;
use property_api::PropertyId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Upload outcome of a single photo inside a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum PhotoUploadStatus {
    Pending,
    Uploaded,
    Failed(String),
    /// No payload was available on the last attempt
    Skipped,
}

/// Resumable state of a submit: the created property and where each photo
/// stands. Persisted with the draft so a retry after a restart neither
/// creates a second property nor re-sends uploaded photos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionJob {
    pub property_id: PropertyId,
    #[serde(default)]
    pub photos: HashMap<Uuid, PhotoUploadStatus>,
}

impl SubmissionJob {
    /// Job for a freshly created property; every photo starts `Pending`
    /// unless it is already marked uploaded.
    pub fn start(property_id: PropertyId, photos: &[PhotoItem]) -> Self {
        let mut job = Self {
            property_id,
            photos: HashMap::new(),
        };
        job.track(photos);
        job
    }

    /// Adds photos the job does not know yet
    pub fn track(&mut self, photos: &[PhotoItem]) {
        for photo in photos {
            let status = if photo.uploaded {
                PhotoUploadStatus::Uploaded
            } else {
                PhotoUploadStatus::Pending
            };
            self.photos.entry(photo.id).or_insert(status);
        }
    }

    pub fn forget(&mut self, photo_id: &Uuid) {
        self.photos.remove(photo_id);
    }

    pub fn status(&self, photo_id: &Uuid) -> Option<&PhotoUploadStatus> {
        self.photos.get(photo_id)
    }

    pub fn set_status(&mut self, photo_id: Uuid, status: PhotoUploadStatus) {
        self.photos.insert(photo_id, status);
    }

    /// Anything not confirmed uploaded is attempted again
    pub fn needs_upload(&self, photo_id: &Uuid) -> bool {
        !matches!(self.status(photo_id), Some(PhotoUploadStatus::Uploaded))
    }

    pub fn failed_photos(&self) -> Vec<Uuid> {
        let mut failed: Vec<Uuid> = self
            .photos
            .iter()
            .filter(|(_, status)| matches!(status, PhotoUploadStatus::Failed(_)))
            .map(|(id, _)| *id)
            .collect();
        failed.sort();
        failed
    }
}
