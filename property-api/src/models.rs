use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Kind of property being valued
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Apartment,
    House,
    Villa,
    Commercial,
    Land,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Apartment => "apartment",
            PropertyType::House => "house",
            PropertyType::Villa => "villa",
            PropertyType::Commercial => "commercial",
            PropertyType::Land => "land",
        }
    }

    /// Upper-case code expected by the backend
    pub fn api_code(&self) -> &'static str {
        match self {
            PropertyType::Apartment => "APARTMENT",
            PropertyType::House => "HOUSE",
            PropertyType::Villa => "VILLA",
            PropertyType::Commercial => "COMMERCIAL",
            PropertyType::Land => "LAND",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "apartment" => Some(PropertyType::Apartment),
            "house" => Some(PropertyType::House),
            "villa" => Some(PropertyType::Villa),
            "commercial" => Some(PropertyType::Commercial),
            "land" => Some(PropertyType::Land),
            _ => None,
        }
    }

    pub fn all() -> &'static [PropertyType] {
        static ALL: [PropertyType; 5] = [
            PropertyType::Apartment,
            PropertyType::House,
            PropertyType::Villa,
            PropertyType::Commercial,
            PropertyType::Land,
        ];
        &ALL
    }
}

/// Server-assigned property identifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PropertyId(pub String);

impl PropertyId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PropertyId {
    fn from(s: &str) -> Self {
        PropertyId(s.to_string())
    }
}

/// Body of `POST /properties/`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreatePropertyRequest {
    #[serde(serialize_with = "serialize_api_code")]
    pub property_type: PropertyType,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    pub area_sqft: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_floors: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn serialize_api_code<S: Serializer>(kind: &PropertyType, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(kind.api_code())
}

/// Response from the create endpoint (only the id is consumed)
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyResponse {
    pub id: PropertyId,
}

/// One photo payload as sent to `POST /properties/{id}/photos`
#[derive(Debug, Clone, Copy)]
pub struct PhotoUpload<'a> {
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub bytes: &'a [u8],
}
