use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};

use crate::{
    auth::AuthUser,
    domain::{Location, NewLocation},
    error::AppResult,
    models::{ApiResponse, LocationQuery},
    state::AppState,
};

pub async fn list_locations(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> AppResult<Json<ApiResponse<Vec<Location>>>> {
    let term = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase);

    let mut locations: Vec<Location> = state
        .store
        .locations()
        .await?
        .into_iter()
        .filter(|location| location.is_active)
        .filter(|location| {
            term.as_deref()
                .is_none_or(|term| location.name.to_lowercase().contains(term))
        })
        .collect();
    locations.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(Json(ApiResponse::new(locations)))
}

pub async fn create_location(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<NewLocation>,
) -> AppResult<(StatusCode, Json<ApiResponse<Location>>)> {
    auth.require_organizer()?;

    let location = state.store.insert_location(payload.into_location()?).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(location))))
}
