use crate::models::ValidationError;
use property_api::ApiError;
use std::fmt;
use uuid::Uuid;

pub use crate::models::{PhotoUploadStatus, SubmissionJob};

/// Stage of a submit, used to say where it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStage {
    Validating,
    Creating,
    UploadingPhotos,
    Finalizing,
}

impl SubmissionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStage::Validating => "validating",
            SubmissionStage::Creating => "creating",
            SubmissionStage::UploadingPhotos => "uploading_photos",
            SubmissionStage::Finalizing => "finalizing",
        }
    }
}

/// Observable progress of [`DraftStore::submit`](super::DraftStore::submit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    Validating,
    Creating,
    UploadingPhotos {
        done: usize,
        total: usize,
    },
    Finalizing,
    Done,
    Failed(SubmissionStage),
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SubmissionState::Idle => write!(f, "idle"),
            SubmissionState::Validating => write!(f, "validating"),
            SubmissionState::Creating => write!(f, "creating"),
            SubmissionState::UploadingPhotos { done, total } => {
                write!(f, "uploading photos ({}/{})", done, total)
            }
            SubmissionState::Finalizing => write!(f, "finalizing"),
            SubmissionState::Done => write!(f, "done"),
            SubmissionState::Failed(stage) => write!(f, "failed while {}", stage.as_str()),
        }
    }
}

impl SubmissionState {
    /// A submit is currently running
    pub fn is_loading(&self) -> bool {
        !matches!(
            self,
            SubmissionState::Idle | SubmissionState::Done | SubmissionState::Failed(_)
        )
    }
}

/// Why a submit stopped
#[derive(Debug)]
pub enum SubmitError {
    /// Required fields missing or invalid; nothing was sent
    Validation(ValidationError),
    /// The property row could not be created; draft intact
    CreateFailed(ApiError),
    /// Upload of one photo failed; earlier photos stay uploaded
    UploadFailed { photo_id: Uuid, cause: ApiError },
    /// All photos uploaded but the final submit call failed
    FinalizeFailed(ApiError),
    /// Another submit on the same store has not finished
    AlreadyInFlight,
}

impl SubmitError {
    pub fn stage(&self) -> Option<SubmissionStage> {
        match self {
            SubmitError::Validation(_) => Some(SubmissionStage::Validating),
            SubmitError::CreateFailed(_) => Some(SubmissionStage::Creating),
            SubmitError::UploadFailed { .. } => Some(SubmissionStage::UploadingPhotos),
            SubmitError::FinalizeFailed(_) => Some(SubmissionStage::Finalizing),
            SubmitError::AlreadyInFlight => None,
        }
    }

    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            SubmitError::CreateFailed(e)
            | SubmitError::UploadFailed { cause: e, .. }
            | SubmitError::FinalizeFailed(e) => Some(e),
            _ => None,
        }
    }

    /// User-friendly message for UI
    pub fn user_message(&self) -> String {
        match self {
            SubmitError::Validation(e) => format!("Please complete the form: {}", e),
            SubmitError::UploadFailed { cause, .. } => {
                format!("A photo could not be uploaded. {}", cause.user_message())
            }
            SubmitError::AlreadyInFlight => "Submission already in progress.".to_string(),
            SubmitError::CreateFailed(e) | SubmitError::FinalizeFailed(e) => e.user_message(),
        }
    }
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SubmitError::Validation(e) => write!(f, "Validation failed: {}", e),
            SubmitError::CreateFailed(e) => write!(f, "Create property failed: {}", e),
            SubmitError::UploadFailed { photo_id, cause } => {
                write!(f, "Upload of photo {} failed: {}", photo_id, cause)
            }
            SubmitError::FinalizeFailed(e) => write!(f, "Finalize failed: {}", e),
            SubmitError::AlreadyInFlight => write!(f, "Submission already in flight"),
        }
    }
}

impl std::error::Error for SubmitError {}

impl From<ValidationError> for SubmitError {
    fn from(e: ValidationError) -> Self {
        SubmitError::Validation(e)
    }
}
