use property_api::{CreatePropertyRequest, PropertyType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Description sent with every intake-created property
pub const DEFAULT_DESCRIPTION: &str = "Valuation Request";

/// In-progress property submission held on the client
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyDraft {
    pub property_type: Option<PropertyType>,
    pub area_sq_ft: Option<f64>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub floor: Option<u32>,
    pub total_floors: Option<u32>,
    pub age_years: Option<u32>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Partial update of a draft. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftPatch {
    pub property_type: Option<PropertyType>,
    pub area_sq_ft: Option<f64>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub floor: Option<u32>,
    pub total_floors: Option<u32>,
    pub age_years: Option<u32>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Fields that must be set before a draft can be submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequiredField {
    PropertyType,
    AreaSqFt,
    Address,
    City,
    State,
    Pincode,
}

impl RequiredField {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequiredField::PropertyType => "propertyType",
            RequiredField::AreaSqFt => "areaSqFt",
            RequiredField::Address => "address",
            RequiredField::City => "city",
            RequiredField::State => "state",
            RequiredField::Pincode => "pincode",
        }
    }

    pub fn all() -> &'static [RequiredField] {
        static ALL: [RequiredField; 6] = [
            RequiredField::PropertyType,
            RequiredField::AreaSqFt,
            RequiredField::Address,
            RequiredField::City,
            RequiredField::State,
            RequiredField::Pincode,
        ];
        &ALL
    }
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a draft cannot be submitted yet
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationError {
    pub missing: Vec<RequiredField>,
    pub invalid: Vec<RequiredField>,
}

impl ValidationError {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |fields: &[RequiredField]| {
            fields
                .iter()
                .map(RequiredField::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        match (self.missing.is_empty(), self.invalid.is_empty()) {
            (false, true) => write!(f, "missing required fields: {}", join(&self.missing)),
            (true, false) => write!(f, "invalid fields: {}", join(&self.invalid)),
            _ => write!(
                f,
                "missing required fields: {}; invalid fields: {}",
                join(&self.missing),
                join(&self.invalid)
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Six ASCII digits
pub fn is_valid_pincode(pincode: &str) -> bool {
    pincode.len() == 6 && pincode.bytes().all(|b| b.is_ascii_digit())
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or("").is_empty()
}

impl PropertyDraft {
    /// Shallow merge; fields set in `patch` win
    pub fn apply(&mut self, patch: DraftPatch) {
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = patch.$field {
                    self.$field = Some(value);
                })*
            };
        }
        merge!(
            property_type,
            area_sq_ft,
            bedrooms,
            bathrooms,
            floor,
            total_floors,
            age_years,
            address,
            city,
            state,
            pincode,
            lat,
            lng,
        );
    }

    pub fn is_empty(&self) -> bool {
        self == &PropertyDraft::default()
    }

    pub fn is_set(&self, field: RequiredField) -> bool {
        match field {
            RequiredField::PropertyType => self.property_type.is_some(),
            RequiredField::AreaSqFt => self.area_sq_ft.is_some(),
            RequiredField::Address => !is_blank(&self.address),
            RequiredField::City => !is_blank(&self.city),
            RequiredField::State => !is_blank(&self.state),
            RequiredField::Pincode => !is_blank(&self.pincode),
        }
    }

    /// Set but unacceptable values
    pub fn is_invalid(&self, field: RequiredField) -> bool {
        match field {
            RequiredField::AreaSqFt => self
                .area_sq_ft
                .is_some_and(|area| !(area.is_finite() && area > 0.0)),
            RequiredField::Pincode => self
                .pincode
                .as_deref()
                .is_some_and(|p| !p.trim().is_empty() && !is_valid_pincode(p.trim())),
            _ => false,
        }
    }

    /// Checks `fields`, reporting missing and invalid ones
    pub fn check(&self, fields: &[RequiredField]) -> Result<(), ValidationError> {
        let error = ValidationError {
            missing: fields.iter().copied().filter(|f| !self.is_set(*f)).collect(),
            invalid: fields.iter().copied().filter(|f| self.is_invalid(*f)).collect(),
        };
        if error.is_empty() {
            Ok(())
        } else {
            Err(error)
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.check(RequiredField::all())
    }

    /// Builds the create request from a draft that passes [`validate`](Self::validate)
    pub fn to_create_request(&self) -> Result<CreatePropertyRequest, ValidationError> {
        self.validate()?;

        let text = |value: &Option<String>| value.as_deref().unwrap_or("").trim().to_string();
        let (Some(property_type), Some(area_sqft)) = (self.property_type, self.area_sq_ft) else {
            return Err(ValidationError {
                missing: vec![RequiredField::PropertyType, RequiredField::AreaSqFt],
                invalid: Vec::new(),
            });
        };

        Ok(CreatePropertyRequest {
            property_type,
            address: text(&self.address),
            city: text(&self.city),
            state: text(&self.state),
            pincode: text(&self.pincode),
            lat: self.lat,
            lng: self.lng,
            area_sqft,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            floor: self.floor,
            total_floors: self.total_floors,
            age: self.age_years,
            description: Some(DEFAULT_DESCRIPTION.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_draft() -> PropertyDraft {
        PropertyDraft {
            property_type: Some(PropertyType::House),
            area_sq_ft: Some(1850.0),
            address: Some("4 Lake View Road".to_string()),
            city: Some("Pune".to_string()),
            state: Some("Maharashtra".to_string()),
            pincode: Some("411001".to_string()),
            ..PropertyDraft::default()
        }
    }

    #[test]
    fn test_apply_overwrites_only_patched_fields() {
        let mut draft = complete_draft();
        draft.apply(DraftPatch {
            city: Some("Mumbai".to_string()),
            bedrooms: Some(3),
            ..DraftPatch::default()
        });

        assert_eq!(draft.city.as_deref(), Some("Mumbai"));
        assert_eq!(draft.bedrooms, Some(3));
        assert_eq!(draft.address.as_deref(), Some("4 Lake View Road"));
    }

    #[test]
    fn test_validate_reports_missing_fields_in_order() {
        let draft = PropertyDraft {
            city: Some("Pune".to_string()),
            address: Some("   ".to_string()),
            ..PropertyDraft::default()
        };

        let err = draft.validate().unwrap_err();
        assert_eq!(
            err.missing,
            vec![
                RequiredField::PropertyType,
                RequiredField::AreaSqFt,
                RequiredField::Address,
                RequiredField::State,
                RequiredField::Pincode,
            ]
        );
        assert!(err.invalid.is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_pincode_and_area() {
        let mut draft = complete_draft();
        draft.pincode = Some("41100".to_string());
        draft.area_sq_ft = Some(0.0);

        let err = draft.validate().unwrap_err();
        assert!(err.missing.is_empty());
        assert_eq!(
            err.invalid,
            vec![RequiredField::AreaSqFt, RequiredField::Pincode]
        );
        assert_eq!(err.to_string(), "invalid fields: areaSqFt, pincode");
    }

    #[test]
    fn test_create_request_maps_fields() {
        let mut draft = complete_draft();
        draft.age_years = Some(12);
        draft.lat = Some(18.52);

        let request = draft.to_create_request().unwrap();
        assert_eq!(request.property_type, PropertyType::House);
        assert_eq!(request.area_sqft, 1850.0);
        assert_eq!(request.age, Some(12));
        assert_eq!(request.lat, Some(18.52));
        assert_eq!(request.description.as_deref(), Some(DEFAULT_DESCRIPTION));
    }

    #[test]
    fn test_draft_serializes_camel_case() {
        let json = serde_json::to_value(complete_draft()).unwrap();
        assert_eq!(json["propertyType"], "house");
        assert_eq!(json["areaSqFt"], 1850.0);
        assert!(json.get("totalFloors").is_some());
    }

    #[test]
    fn test_pincode_rule() {
        assert!(is_valid_pincode("560001"));
        assert!(!is_valid_pincode("56000a"));
        assert!(!is_valid_pincode("5600011"));
    }
}
