pub mod photo_item;
pub mod property_draft;
pub mod snapshot;
pub mod submission_job;
pub mod wizard;

pub use photo_item::PhotoItem;
pub use property_draft::{DraftPatch, PropertyDraft, RequiredField, ValidationError};
pub use snapshot::{DraftSnapshot, DRAFT_STORAGE_KEY};
pub use submission_job::{PhotoUploadStatus, SubmissionJob};
pub use wizard::{WizardState, WizardStep};
