use super::location_service;
use super::photo_cache::LocalUriRegistry;
use super::submission::{
    PhotoUploadStatus, SubmissionJob, SubmissionStage, SubmissionState, SubmitError,
};
use crate::database::KeyValueStorage;
use crate::models::{
    DraftPatch, DraftSnapshot, PhotoItem, PropertyDraft, RequiredField, ValidationError,
    WizardState, WizardStep, DRAFT_STORAGE_KEY,
};
use chrono::{DateTime, Utc};
use property_api::{PhotoUpload, PropertyApi, PropertyId};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, MutexGuard};
use uuid::Uuid;

/// Why the wizard cannot move past the current step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepBlocked {
    Fields(ValidationError),
    NoPhotos,
}

impl fmt::Display for StepBlocked {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StepBlocked::Fields(e) => write!(f, "{}", e),
            StepBlocked::NoPhotos => write!(f, "add at least one photo"),
        }
    }
}

impl std::error::Error for StepBlocked {}

/// The property intake wizard.
///
/// Every mutation is written through to storage as one snapshot; a failed
/// write is logged and the in-memory state is kept. `submit` runs
/// create, upload and finalize in order and keeps what succeeded in a
/// [`SubmissionJob`] so the next `submit` resumes instead of starting over.
pub struct DraftStore {
    storage: Arc<dyn KeyValueStorage>,
    api: Arc<dyn PropertyApi>,
    uris: Arc<dyn LocalUriRegistry>,
    draft: PropertyDraft,
    photos: Vec<PhotoItem>,
    wizard: WizardState,
    last_saved_at: Option<DateTime<Utc>>,
    job: Option<SubmissionJob>,
    restored: bool,
    state: watch::Sender<SubmissionState>,
}

impl DraftStore {
    /// Empty store; nothing is read from storage
    pub fn new(
        storage: Arc<dyn KeyValueStorage>,
        api: Arc<dyn PropertyApi>,
        uris: Arc<dyn LocalUriRegistry>,
    ) -> Self {
        let (state, _rx) = watch::channel(SubmissionState::Idle);
        Self {
            storage,
            api,
            uris,
            draft: PropertyDraft::default(),
            photos: Vec::new(),
            wizard: WizardState::default(),
            last_saved_at: None,
            job: None,
            restored: false,
            state,
        }
    }

    /// Store restored from the persisted snapshot. A missing or unreadable
    /// snapshot gives an empty store.
    pub fn load(
        storage: Arc<dyn KeyValueStorage>,
        api: Arc<dyn PropertyApi>,
        uris: Arc<dyn LocalUriRegistry>,
    ) -> Self {
        let mut store = Self::new(storage, api, uris);

        let snapshot = match store.storage.get(DRAFT_STORAGE_KEY) {
            Ok(Some(raw)) => match DraftSnapshot::from_json(&raw) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    log::warn!("Discarding corrupt draft snapshot: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                log::warn!("Could not read draft snapshot: {}", e);
                None
            }
        };

        if let Some(snapshot) = snapshot {
            store.draft = snapshot.draft;
            store.photos = snapshot.photos;
            store.wizard = WizardState::at(snapshot.current_step.index() as i64);
            store.last_saved_at = snapshot.last_saved_at;
            store.job = snapshot.submission;
            if let Some(job) = store.job.as_mut() {
                job.track(&store.photos);
                log::info!("Pending submission of property {}", job.property_id);
            }
            store.restored = !store.draft.is_empty() || !store.photos.is_empty();
            store.rehydrate_photos();
            log::info!(
                "Restored draft at step '{}' with {} photo(s)",
                store.wizard.step().as_str(),
                store.photos.len()
            );
        }

        store
    }

    pub fn draft(&self) -> &PropertyDraft {
        &self.draft
    }

    pub fn photos(&self) -> &[PhotoItem] {
        &self.photos
    }

    pub fn wizard(&self) -> WizardState {
        self.wizard
    }

    pub fn current_step(&self) -> WizardStep {
        self.wizard.step()
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at
    }

    pub fn job(&self) -> Option<&SubmissionJob> {
        self.job.as_ref()
    }

    pub fn submission_state(&self) -> SubmissionState {
        *self.state.borrow()
    }

    pub fn is_loading(&self) -> bool {
        self.submission_state().is_loading()
    }

    pub fn subscribe_submission(&self) -> watch::Receiver<SubmissionState> {
        self.state.subscribe()
    }

    /// A non-empty draft was restored from storage and not yet discarded
    pub fn has_resumable_draft(&self) -> bool {
        self.restored && (!self.draft.is_empty() || !self.photos.is_empty())
    }

    pub fn set_field(&mut self, patch: DraftPatch) {
        self.draft.apply(patch);
        self.touch();
    }

    pub fn add_photo(&mut self, photo: PhotoItem) {
        log::debug!("Adding photo {} ({})", photo.id, photo.local_uri);
        if let Some(job) = self.job.as_mut() {
            job.track(std::slice::from_ref(&photo));
        }
        self.photos.push(photo);
        self.touch();
    }

    /// Removes the photo and releases its local URI. Returns false for an unknown id.
    pub fn remove_photo(&mut self, id: &Uuid) -> bool {
        let Some(index) = self.photos.iter().position(|p| &p.id == id) else {
            return false;
        };
        let photo = self.photos.remove(index);
        self.uris.revoke(&photo.local_uri);
        if let Some(job) = self.job.as_mut() {
            job.forget(id);
        }
        self.touch();
        true
    }

    /// Retags a photo. Returns false for an unknown id.
    pub fn update_photo(&mut self, id: &Uuid, room_category: Option<String>) -> bool {
        let Some(photo) = self.photos.iter_mut().find(|p| &p.id == id) else {
            return false;
        };
        photo.room_category = room_category;
        self.touch();
        true
    }

    pub fn set_step(&mut self, index: i64) {
        self.wizard = WizardState::at(index);
        self.touch();
    }

    /// Moves forward if the current step is complete
    pub fn advance(&mut self) -> Result<WizardStep, StepBlocked> {
        self.check_step(self.wizard.step())?;
        self.wizard = self.wizard.next();
        self.touch();
        Ok(self.wizard.step())
    }

    pub fn back(&mut self) -> WizardStep {
        self.wizard = self.wizard.previous();
        self.touch();
        self.wizard.step()
    }

    fn check_step(&self, step: WizardStep) -> Result<(), StepBlocked> {
        let fields: &[RequiredField] = match step {
            WizardStep::Type => &[RequiredField::PropertyType],
            WizardStep::Details => &[RequiredField::PropertyType, RequiredField::AreaSqFt],
            WizardStep::Location => &[
                RequiredField::Address,
                RequiredField::City,
                RequiredField::State,
                RequiredField::Pincode,
            ],
            WizardStep::Photos => {
                if self.photos.is_empty() {
                    return Err(StepBlocked::NoPhotos);
                }
                &[]
            }
            WizardStep::Review => &[],
        };
        self.draft.check(fields).map_err(StepBlocked::Fields)
    }

    /// Geotagged photos too far from the pinned location
    pub fn location_warnings(&self, max_km: f64) -> Vec<Uuid> {
        location_service::photos_outside_radius(&self.draft, &self.photos, max_km)
    }

    /// Clears everything, releases every photo URI and drops the snapshot
    pub fn reset_draft(&mut self) {
        self.clear();
        self.state.send_replace(SubmissionState::Idle);
    }

    fn clear(&mut self) {
        for photo in self.photos.drain(..) {
            self.uris.revoke(&photo.local_uri);
        }
        self.draft = PropertyDraft::default();
        self.wizard = WizardState::default();
        self.last_saved_at = None;
        self.job = None;
        self.restored = false;

        if let Err(e) = self.storage.remove(DRAFT_STORAGE_KEY) {
            log::error!("Failed to remove draft snapshot: {}", e);
        }
    }

    /// Reloads payloads of photos still waiting for upload from their URIs.
    /// Returns how many were restored.
    pub fn rehydrate_photos(&mut self) -> usize {
        let mut restored = 0;
        for photo in self.photos.iter_mut().filter(|p| !p.uploaded && p.payload.is_none()) {
            match self.uris.resolve(&photo.local_uri) {
                Some(bytes) => {
                    photo.payload = Some(bytes);
                    restored += 1;
                }
                None => log::warn!("Photo {} has no local data at {}", photo.id, photo.local_uri),
            }
        }
        restored
    }

    fn touch(&mut self) {
        self.last_saved_at = Some(Utc::now());
        self.persist();
    }

    /// Writes the snapshot. Failures are logged, never returned.
    fn persist(&self) {
        let snapshot = DraftSnapshot {
            draft: self.draft.clone(),
            photos: self.photos.clone(),
            current_step: self.wizard,
            last_saved_at: self.last_saved_at,
            submission: self.job.clone(),
        };

        let result = snapshot
            .to_json()
            .map_err(crate::error::AppError::from)
            .and_then(|json| self.storage.set(DRAFT_STORAGE_KEY, &json));
        if let Err(e) = result {
            log::error!("StorageWriteFailed: could not persist draft: {}", e);
        }
    }

    fn fail(&self, stage: SubmissionStage) {
        self.state.send_replace(SubmissionState::Failed(stage));
    }

    /// Submits the draft: create, upload every pending photo in order, finalize.
    ///
    /// On failure the draft, photos and the created property id are kept;
    /// calling `submit` again skips whatever already succeeded. On success
    /// the draft is cleared and the property id returned.
    pub async fn submit(&mut self) -> Result<PropertyId, SubmitError> {
        self.state.send_replace(SubmissionState::Validating);
        let request = match self.draft.to_create_request() {
            Ok(request) => request,
            Err(e) => {
                log::info!("Submit rejected: {}", e);
                self.fail(SubmissionStage::Validating);
                return Err(SubmitError::Validation(e));
            }
        };

        let property_id = match self.job.as_ref().map(|job| job.property_id.clone()) {
            Some(id) => {
                log::info!("Resuming submission of property {}", id);
                id
            }
            None => {
                self.state.send_replace(SubmissionState::Creating);
                match self.api.create_property(&request).await {
                    Ok(id) => {
                        self.job = Some(SubmissionJob::start(id.clone(), &self.photos));
                        self.persist();
                        id
                    }
                    Err(e) => {
                        log::warn!("Create property failed: {}", e);
                        self.fail(SubmissionStage::Creating);
                        return Err(SubmitError::CreateFailed(e));
                    }
                }
            }
        };

        self.upload_photos(&property_id).await?;

        self.state.send_replace(SubmissionState::Finalizing);
        if let Err(e) = self.api.submit_property(&property_id).await {
            log::warn!("Finalize of property {} failed: {}", property_id, e);
            self.fail(SubmissionStage::Finalizing);
            return Err(SubmitError::FinalizeFailed(e));
        }

        log::info!("Property {} submitted for valuation", property_id);
        self.clear();
        self.state.send_replace(SubmissionState::Done);
        Ok(property_id)
    }

    async fn upload_photos(&mut self, property_id: &PropertyId) -> Result<(), SubmitError> {
        let job = self
            .job
            .get_or_insert_with(|| SubmissionJob::start(property_id.clone(), &[]));
        job.track(&self.photos);
        let pending: Vec<usize> = self
            .photos
            .iter()
            .enumerate()
            .filter(|(_, p)| job.needs_upload(&p.id))
            .map(|(index, _)| index)
            .collect();
        let total = pending.len();

        for (done, index) in pending.into_iter().enumerate() {
            self.state
                .send_replace(SubmissionState::UploadingPhotos { done, total });

            let photo = &self.photos[index];
            let photo_id = photo.id;
            let bytes = match photo.payload.as_deref() {
                Some(bytes) if photo.is_pending_upload() => bytes,
                _ => {
                    log::warn!("Skipping photo {}: no data to upload", photo_id);
                    self.record(photo_id, PhotoUploadStatus::Skipped);
                    continue;
                }
            };

            let file_name = format!("photo-{}.jpg", index + 1);
            let upload = PhotoUpload {
                file_name: &file_name,
                content_type: &photo.content_type,
                bytes,
            };
            let result = self.api.upload_photo(property_id, upload).await;

            match result {
                Ok(()) => {
                    self.photos[index].mark_uploaded();
                    self.record(photo_id, PhotoUploadStatus::Uploaded);
                }
                Err(e) => {
                    log::warn!("Upload of photo {} failed: {}", photo_id, e);
                    self.record(photo_id, PhotoUploadStatus::Failed(e.to_string()));
                    self.fail(SubmissionStage::UploadingPhotos);
                    return Err(SubmitError::UploadFailed { photo_id, cause: e });
                }
            }
        }
        Ok(())
    }

    /// Stores a photo's upload outcome in the job and persists it
    fn record(&mut self, photo_id: Uuid, status: PhotoUploadStatus) {
        if let Some(job) = self.job.as_mut() {
            job.set_status(photo_id, status);
        }
        self.persist();
    }
}

/// Clonable handle for sharing one [`DraftStore`] between tasks.
///
/// A second `submit` while one is running is rejected with
/// [`SubmitError::AlreadyInFlight`] rather than queued.
#[derive(Clone)]
pub struct SharedDraftStore {
    inner: Arc<Mutex<DraftStore>>,
    submitting: Arc<AtomicBool>,
    state: watch::Receiver<SubmissionState>,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SharedDraftStore {
    pub fn new(store: DraftStore) -> Self {
        let state = store.subscribe_submission();
        Self {
            inner: Arc::new(Mutex::new(store)),
            submitting: Arc::new(AtomicBool::new(false)),
            state,
        }
    }

    /// Exclusive access for edits. Waits while a submit holds the store.
    pub async fn lock(&self) -> MutexGuard<'_, DraftStore> {
        self.inner.lock().await
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    pub fn subscribe_submission(&self) -> watch::Receiver<SubmissionState> {
        self.state.clone()
    }

    pub async fn submit(&self) -> Result<PropertyId, SubmitError> {
        if self.submitting.swap(true, Ordering::SeqCst) {
            log::debug!("Submit already in flight, rejecting");
            return Err(SubmitError::AlreadyInFlight);
        }
        let _guard = InFlightGuard(&self.submitting);
        self.inner.lock().await.submit().await
    }
}
