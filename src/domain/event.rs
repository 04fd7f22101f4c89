use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::{FoodCategory, OrganizerSummary, ValidationError};

pub const MAX_EVENT_NAME_LEN: usize = 200;
pub const MAX_LOCATION_LEN: usize = 200;
pub const MAX_ROOM_LEN: usize = 50;
pub const MAX_DESCRIPTION_LEN: usize = 5000;
pub const MAX_QUANTITY: u32 = 10_000;
pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_LEN: usize = 40;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub event_name: String,
    pub event_location: String,
    pub location_id: Option<Uuid>,
    pub room_number: Option<String>,
    pub event_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub food_type: String,
    pub food_categories: Vec<FoodCategory>,
    pub quantity: u32,
    pub quantity_remaining: u32,
    pub event_description: Option<String>,
    pub event_tags: Vec<String>,
    pub event_image: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn from_new(id: Uuid, organizer_id: Uuid, new: NewEvent, now: DateTime<Utc>) -> Self {
        let food_type = resolve_food_type(new.food_type, &new.food_categories);

        Self {
            id,
            organizer_id,
            event_name: new.event_name.trim().to_string(),
            event_location: new.event_location.trim().to_string(),
            location_id: new.location_id,
            room_number: non_blank(new.room_number),
            event_date: new.event_date,
            start_time: new.start_time,
            end_time: new.end_time,
            food_type,
            food_categories: new.food_categories,
            quantity: new.quantity,
            quantity_remaining: new.quantity,
            event_description: non_blank(new.event_description),
            event_tags: new.event_tags,
            event_image: non_blank(new.event_image),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Servings currently held by confirmed reservations.
    pub fn reserved(&self) -> u32 {
        self.quantity - self.quantity_remaining
    }

    pub fn is_sold_out(&self) -> bool {
        self.quantity_remaining == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventWithOrganizer {
    #[serde(flatten)]
    pub event: Event,
    pub organizer: Option<OrganizerSummary>,
}

/// Tags arrive either as a list or as the comma-separated text of the post form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagsInput {
    List(Vec<String>),
    Csv(String),
}

impl TagsInput {
    pub fn into_tags(self) -> Result<Vec<String>, ValidationError> {
        let raw = match self {
            Self::List(tags) => tags,
            Self::Csv(text) => text.split(',').map(str::to_string).collect(),
        };
        normalize_tags(raw)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventRequest {
    pub event_name: String,
    pub event_location: String,
    #[serde(default)]
    pub location_id: Option<Uuid>,
    #[serde(default)]
    pub room_number: Option<String>,
    pub event_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub food_type: Option<String>,
    #[serde(default)]
    pub food_categories: Vec<FoodCategory>,
    pub quantity: u32,
    #[serde(default)]
    pub event_description: Option<String>,
    #[serde(default)]
    pub event_tags: Option<TagsInput>,
    #[serde(default)]
    pub event_image: Option<String>,
}

/// Validated input for a new event.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_name: String,
    pub event_location: String,
    pub location_id: Option<Uuid>,
    pub room_number: Option<String>,
    pub event_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub food_type: Option<String>,
    pub food_categories: Vec<FoodCategory>,
    pub quantity: u32,
    pub event_description: Option<String>,
    pub event_tags: Vec<String>,
    pub event_image: Option<String>,
}

impl TryFrom<CreateEventRequest> for NewEvent {
    type Error = ValidationError;

    fn try_from(request: CreateEventRequest) -> Result<Self, Self::Error> {
        validate_name(&request.event_name)?;
        validate_location(&request.event_location)?;
        validate_room(request.room_number.as_deref())?;
        validate_description(request.event_description.as_deref())?;
        validate_quantity(request.quantity)?;
        validate_window(request.start_time, request.end_time)?;

        let event_tags = match request.event_tags {
            Some(tags) => tags.into_tags()?,
            None => Vec::new(),
        };

        Ok(Self {
            event_name: request.event_name,
            event_location: request.event_location,
            location_id: request.location_id,
            room_number: request.room_number,
            event_date: request.event_date,
            start_time: request.start_time,
            end_time: request.end_time,
            food_type: request.food_type,
            food_categories: request.food_categories,
            quantity: request.quantity,
            event_description: request.event_description,
            event_tags,
            event_image: request.event_image,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPatch {
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub event_location: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub location_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub room_number: Option<Option<String>>,
    #[serde(default)]
    pub event_date: Option<NaiveDate>,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub food_type: Option<String>,
    #[serde(default)]
    pub food_categories: Option<Vec<FoodCategory>>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default, deserialize_with = "double_option")]
    pub event_description: Option<Option<String>>,
    #[serde(default)]
    pub event_tags: Option<TagsInput>,
    #[serde(default, deserialize_with = "double_option")]
    pub event_image: Option<Option<String>>,
}

impl EventPatch {
    pub fn has_changes(&self) -> bool {
        self.event_name.is_some()
            || self.event_location.is_some()
            || self.location_id.is_some()
            || self.room_number.is_some()
            || self.event_date.is_some()
            || self.start_time.is_some()
            || self.end_time.is_some()
            || self.food_type.is_some()
            || self.food_categories.is_some()
            || self.quantity.is_some()
            || self.event_description.is_some()
            || self.event_tags.is_some()
            || self.event_image.is_some()
    }

    /// Field-level checks that do not depend on the stored event.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.has_changes() {
            return Err(ValidationError::new(
                "at least one field must be provided for PATCH",
            ));
        }
        if let Some(name) = self.event_name.as_deref() {
            validate_name(name)?;
        }
        if let Some(location) = self.event_location.as_deref() {
            validate_location(location)?;
        }
        validate_room(self.room_number.as_ref().and_then(|room| room.as_deref()))?;
        validate_description(
            self.event_description
                .as_ref()
                .and_then(|description| description.as_deref()),
        )?;
        if let Some(quantity) = self.quantity {
            validate_quantity(quantity)?;
        }
        Ok(())
    }

    /// Applies the patch. The caller has already checked that a new quantity
    /// still covers the servings held by reservations.
    pub fn apply(self, event: &mut Event, now: DateTime<Utc>) -> Result<(), ValidationError> {
        let start_time = self.start_time.unwrap_or(event.start_time);
        let end_time = self.end_time.unwrap_or(event.end_time);
        validate_window(start_time, end_time)?;

        let event_tags = match self.event_tags {
            Some(tags) => Some(tags.into_tags()?),
            None => None,
        };

        if let Some(name) = self.event_name {
            event.event_name = name.trim().to_string();
        }
        if let Some(location) = self.event_location {
            event.event_location = location.trim().to_string();
        }
        if let Some(location_id) = self.location_id {
            event.location_id = location_id;
        }
        if let Some(room) = self.room_number {
            event.room_number = non_blank(room);
        }
        if let Some(date) = self.event_date {
            event.event_date = date;
        }
        event.start_time = start_time;
        event.end_time = end_time;
        if let Some(categories) = self.food_categories {
            event.food_categories = categories;
            if self.food_type.is_none() {
                event.food_type = resolve_food_type(None, &event.food_categories);
            }
        }
        if let Some(food_type) = self.food_type {
            event.food_type = resolve_food_type(Some(food_type), &event.food_categories);
        }
        if let Some(quantity) = self.quantity {
            let reserved = event.reserved();
            event.quantity = quantity;
            event.quantity_remaining = quantity - reserved;
        }
        if let Some(description) = self.event_description {
            event.event_description = non_blank(description);
        }
        if let Some(tags) = event_tags {
            event.event_tags = tags;
        }
        if let Some(image) = self.event_image {
            event.event_image = non_blank(image);
        }

        event.updated_at = now;
        Ok(())
    }
}

/// Trims, lower-cases and de-duplicates tags, dropping blanks.
pub fn normalize_tags(raw: Vec<String>) -> Result<Vec<String>, ValidationError> {
    let mut tags: Vec<String> = Vec::new();

    for tag in raw {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() || tags.contains(&tag) {
            continue;
        }
        if tag.chars().count() > MAX_TAG_LEN {
            return Err(ValidationError::new(format!(
                "tags must be at most {MAX_TAG_LEN} characters"
            )));
        }
        tags.push(tag);
    }

    if tags.len() > MAX_TAGS {
        return Err(ValidationError::new(format!(
            "at most {MAX_TAGS} tags are allowed"
        )));
    }

    Ok(tags)
}

fn resolve_food_type(food_type: Option<String>, categories: &[FoodCategory]) -> String {
    match food_type.map(|value| value.trim().to_string()) {
        Some(value) if !value.is_empty() => value,
        _ => categories
            .first()
            .copied()
            .unwrap_or(FoodCategory::Other)
            .as_str()
            .to_string(),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::new("event_name must not be blank"));
    }
    if name.chars().count() > MAX_EVENT_NAME_LEN {
        return Err(ValidationError::new(format!(
            "event_name must be at most {MAX_EVENT_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_location(location: &str) -> Result<(), ValidationError> {
    if location.trim().is_empty() {
        return Err(ValidationError::new("event_location must not be blank"));
    }
    if location.chars().count() > MAX_LOCATION_LEN {
        return Err(ValidationError::new(format!(
            "event_location must be at most {MAX_LOCATION_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_room(room: Option<&str>) -> Result<(), ValidationError> {
    if let Some(room) = room
        && room.chars().count() > MAX_ROOM_LEN
    {
        return Err(ValidationError::new(format!(
            "room_number must be at most {MAX_ROOM_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_description(description: Option<&str>) -> Result<(), ValidationError> {
    if let Some(description) = description
        && description.chars().count() > MAX_DESCRIPTION_LEN
    {
        return Err(ValidationError::new(format!(
            "event_description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_quantity(quantity: u32) -> Result<(), ValidationError> {
    if !(1..=MAX_QUANTITY).contains(&quantity) {
        return Err(ValidationError::new(format!(
            "quantity must be between 1 and {MAX_QUANTITY}"
        )));
    }
    Ok(())
}

fn validate_window(start: NaiveTime, end: NaiveTime) -> Result<(), ValidationError> {
    if end <= start {
        return Err(ValidationError::new("end_time must be after start_time"));
    }
    Ok(())
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> CreateEventRequest {
        serde_json::from_value(json!({
            "event_name": "  Hackathon showcase lunch ",
            "event_location": "Photonics Center",
            "room_number": "  ",
            "event_date": "2026-10-20",
            "start_time": "12:00:00",
            "end_time": "14:00:00",
            "food_categories": ["vegan"],
            "quantity": 40,
            "event_tags": "Vegan, warm, , vegan"
        }))
        .unwrap()
    }

    #[test]
    fn new_event_starts_with_full_quantity() {
        let new = NewEvent::try_from(request()).unwrap();
        let event = Event::from_new(Uuid::new_v4(), Uuid::new_v4(), new, Utc::now());

        assert_eq!(event.event_name, "Hackathon showcase lunch");
        assert_eq!(event.quantity_remaining, 40);
        assert_eq!(event.room_number, None);
        assert_eq!(event.food_type, "vegan");
        assert_eq!(event.event_tags, vec!["vegan", "warm"]);
        assert!(event.is_active);
    }

    #[test]
    fn window_must_be_forward() {
        let mut bad = request();
        bad.end_time = bad.start_time;
        assert_eq!(
            NewEvent::try_from(bad).unwrap_err().message(),
            "end_time must be after start_time"
        );
    }

    #[test]
    fn quantity_bounds_are_enforced() {
        let mut bad = request();
        bad.quantity = 0;
        assert!(NewEvent::try_from(bad).is_err());
    }

    #[test]
    fn patch_keeps_reserved_servings_when_quantity_changes() {
        let new = NewEvent::try_from(request()).unwrap();
        let mut event = Event::from_new(Uuid::new_v4(), Uuid::new_v4(), new, Utc::now());
        event.quantity_remaining = 30;

        EventPatch {
            quantity: Some(15),
            ..EventPatch::default()
        }
        .apply(&mut event, Utc::now())
        .unwrap();

        assert_eq!(event.quantity, 15);
        assert_eq!(event.quantity_remaining, 5);
    }

    #[test]
    fn patch_can_clear_nullable_fields() {
        let patch: EventPatch = serde_json::from_value(json!({
            "event_description": null,
            "event_image": null
        }))
        .unwrap();
        assert_eq!(patch.event_description, Some(None));
        assert!(patch.validate().is_ok());

        let empty: EventPatch = serde_json::from_value(json!({})).unwrap();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn patch_rechecks_window_against_stored_times() {
        let new = NewEvent::try_from(request()).unwrap();
        let mut event = Event::from_new(Uuid::new_v4(), Uuid::new_v4(), new, Utc::now());

        let result = EventPatch {
            end_time: Some(NaiveTime::from_hms_opt(11, 0, 0).unwrap()),
            ..EventPatch::default()
        }
        .apply(&mut event, Utc::now());

        assert!(result.is_err());
        assert_eq!(event.end_time, NaiveTime::from_hms_opt(14, 0, 0).unwrap());
    }

    #[test]
    fn too_many_tags_are_rejected() {
        let tags = (0..=MAX_TAGS).map(|i| format!("tag{i}")).collect();
        assert!(normalize_tags(tags).is_err());
    }
}
