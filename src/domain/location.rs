use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ValidationError;

/// A campus place shown on the map and offered by the event form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLocation {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default = "default_kind", rename = "type")]
    pub kind: String,
}

fn default_kind() -> String {
    "building".to_string()
}

impl NewLocation {
    pub fn into_location(self) -> Result<Location, ValidationError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::new("name must not be blank"));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(ValidationError::new("lat must be between -90 and 90"));
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(ValidationError::new("lng must be between -180 and 180"));
        }

        let slug = slugify(&name);
        if slug.is_empty() {
            return Err(ValidationError::new(
                "name must contain at least one letter or digit",
            ));
        }

        Ok(Location {
            id: Uuid::new_v4(),
            name,
            slug,
            lat: self.lat,
            lng: self.lng,
            kind: self.kind.trim().to_lowercase(),
            is_active: true,
        })
    }
}

/// Lower-case ASCII words joined by single dashes.
pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}
