pub mod draft_store;
pub mod location_service;
pub mod photo_cache;
pub mod session;
pub mod submission;

pub use draft_store::{DraftStore, SharedDraftStore, StepBlocked};
pub use photo_cache::{CaptureCache, LocalUriRegistry};
pub use session::Session;
pub use submission::{
    PhotoUploadStatus, SubmissionJob, SubmissionStage, SubmissionState, SubmitError,
};
