use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DietaryRestriction, User};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiMessage {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionPayload {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct FoodRestrictionsRequest {
    pub food_restrictions: Vec<DietaryRestriction>,
}

#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    #[serde(default = "default_servings")]
    pub servings: u32,
}

impl Default for ReserveRequest {
    fn default() -> Self {
        Self {
            servings: default_servings(),
        }
    }
}

fn default_servings() -> u32 {
    1
}

#[derive(Debug, Default, Deserialize)]
pub struct LocationQuery {
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TagOption {
    pub value: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TagCatalog {
    pub dietary_restrictions: Vec<TagOption>,
    pub event_tags: Vec<&'static str>,
}
