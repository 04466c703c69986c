use crate::models::{PhotoItem, PropertyDraft};
use uuid::Uuid;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Default distance a photo may be taken from the pinned property location
pub const DEFAULT_MAX_DISTANCE_KM: f64 = 0.5;

/// Great-circle distance in kilometres (haversine)
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Geotagged photos taken farther than `max_km` from the draft location.
///
/// Advisory only: photos without GPS, or a draft without a pin, are never flagged.
pub fn photos_outside_radius(draft: &PropertyDraft, photos: &[PhotoItem], max_km: f64) -> Vec<Uuid> {
    let Some((lat, lng)) = draft.lat.zip(draft.lng) else {
        return Vec::new();
    };

    photos
        .iter()
        .filter_map(|photo| {
            let (photo_lat, photo_lng) = photo.gps()?;
            let distance = haversine_km(lat, lng, photo_lat, photo_lng);
            if distance > max_km {
                log::debug!("Photo {} is {:.2} km from the property", photo.id, distance);
                Some(photo.id)
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // Mumbai CST to Pune station, roughly 120 km
        let d = haversine_km(18.9398, 72.8355, 18.5284, 73.8742);
        assert!((115.0..125.0).contains(&d), "got {}", d);
        assert_eq!(haversine_km(12.0, 77.0, 12.0, 77.0), 0.0);
    }

    #[test]
    fn test_flags_only_far_geotagged_photos() {
        let draft = PropertyDraft {
            lat: Some(12.9716),
            lng: Some(77.5946),
            ..PropertyDraft::default()
        };
        let near = PhotoItem::new("a.jpg", vec![]).with_gps(12.9720, 77.5950);
        let far = PhotoItem::new("b.jpg", vec![]).with_gps(12.9900, 77.5946);
        let untagged = PhotoItem::new("c.jpg", vec![]);

        let flagged = photos_outside_radius(
            &draft,
            &[near, far.clone(), untagged],
            DEFAULT_MAX_DISTANCE_KM,
        );
        assert_eq!(flagged, vec![far.id]);
    }

    #[test]
    fn test_no_pin_flags_nothing() {
        let photo = PhotoItem::new("a.jpg", vec![]).with_gps(0.0, 0.0);
        assert!(photos_outside_radius(&PropertyDraft::default(), &[photo], 0.5).is_empty());
    }
}
