use super::{PhotoItem, PropertyDraft, SubmissionJob, WizardState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage key of the persisted draft snapshot
pub const DRAFT_STORAGE_KEY: &str = "propflow-property-draft";

/// Everything needed to resume the wizard after a restart
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    #[serde(default)]
    pub draft: PropertyDraft,
    #[serde(default)]
    pub photos: Vec<PhotoItem>,
    #[serde(default)]
    pub current_step: WizardState,
    #[serde(default)]
    pub last_saved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission: Option<SubmissionJob>,
}

impl DraftSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
