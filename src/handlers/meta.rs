use axum::Json;

use crate::domain::DietaryRestriction;
use crate::domain::dietary::common_event_tags;
use crate::models::{ApiMessage, ApiResponse, TagCatalog, TagOption};

pub async fn healthcheck() -> Json<ApiResponse<ApiMessage>> {
    Json(ApiResponse::new(ApiMessage {
        message: "ok".to_string(),
    }))
}

/// Options for the dietary checkboxes and the tag suggestions.
pub async fn tag_catalog() -> Json<ApiResponse<TagCatalog>> {
    let dietary_restrictions = DietaryRestriction::ALL
        .into_iter()
        .map(|restriction| TagOption {
            value: restriction.as_str(),
            label: restriction.label(),
        })
        .collect();

    Json(ApiResponse::new(TagCatalog {
        dietary_restrictions,
        event_tags: common_event_tags(),
    }))
}
