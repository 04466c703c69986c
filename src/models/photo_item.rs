use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A photo attached to the draft.
///
/// The raw bytes live in `payload` until the upload succeeds and are never
/// written to the snapshot. After a restart the payload is rehydrated from
/// `local_uri`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoItem {
    pub id: Uuid,
    pub local_uri: String,
    #[serde(default)]
    pub room_category: Option<String>,
    #[serde(default)]
    pub uploaded: bool,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub gps_lat: Option<f64>,
    #[serde(default)]
    pub gps_lng: Option<f64>,
    #[serde(skip)]
    pub payload: Option<Vec<u8>>,
}

fn default_content_type() -> String {
    "image/jpeg".to_string()
}

/// MIME type from the file extension, JPEG unless it says otherwise
pub fn guess_content_type(uri: &str) -> &'static str {
    let lower = uri.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

impl PhotoItem {
    /// New, not yet uploaded photo with a fresh id
    pub fn new(local_uri: impl Into<String>, payload: Vec<u8>) -> Self {
        let local_uri = local_uri.into();
        Self {
            id: Uuid::new_v4(),
            content_type: guess_content_type(&local_uri).to_string(),
            local_uri,
            room_category: None,
            uploaded: false,
            captured_at: Some(Utc::now()),
            gps_lat: None,
            gps_lng: None,
            payload: Some(payload),
        }
    }

    pub fn with_room_category(mut self, category: impl Into<String>) -> Self {
        self.room_category = Some(category.into());
        self
    }

    pub fn with_gps(mut self, lat: f64, lng: f64) -> Self {
        self.gps_lat = Some(lat);
        self.gps_lng = Some(lng);
        self
    }

    pub fn gps(&self) -> Option<(f64, f64)> {
        self.gps_lat.zip(self.gps_lng)
    }

    /// Still waiting for upload and has bytes to send
    pub fn is_pending_upload(&self) -> bool {
        !self.uploaded && self.payload.is_some()
    }

    /// Upload confirmed; the bytes are no longer needed
    pub fn mark_uploaded(&mut self) {
        self.uploaded = true;
        self.payload = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(guess_content_type("file:///captures/a.PNG"), "image/png");
        assert_eq!(guess_content_type("captures/b.webp"), "image/webp");
        assert_eq!(guess_content_type("captures/c.jpeg"), "image/jpeg");
        assert_eq!(guess_content_type("blob:1234"), "image/jpeg");
    }

    #[test]
    fn test_payload_is_not_serialized() {
        let photo = PhotoItem::new("captures/kitchen.jpg", vec![1, 2, 3]).with_room_category("kitchen");

        let json = serde_json::to_string(&photo).unwrap();
        assert!(!json.contains("payload"));
        assert!(json.contains("\"roomCategory\":\"kitchen\""));

        let restored: PhotoItem = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id, photo.id);
        assert_eq!(restored.payload, None);
        assert!(!restored.is_pending_upload());
    }

    #[test]
    fn test_mark_uploaded_drops_payload() {
        let mut photo = PhotoItem::new("captures/hall.jpg", vec![9; 16]);
        assert!(photo.is_pending_upload());

        photo.mark_uploaded();
        assert!(photo.uploaded);
        assert_eq!(photo.payload, None);
    }
}
