use axum::{Json, extract::State};

use crate::{
    auth::AuthUser,
    domain::{Event, ProfilePatch, Reservation, User},
    error::AppResult,
    models::{ApiResponse, FoodRestrictionsRequest},
    state::AppState,
    store::EventScope,
};

pub async fn me(auth: AuthUser) -> Json<ApiResponse<User>> {
    Json(ApiResponse::new(auth.user))
}

pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(patch): Json<ProfilePatch>,
) -> AppResult<Json<ApiResponse<User>>> {
    let user = state.store.update_user(auth.user.id, patch).await?;
    Ok(Json(ApiResponse::new(user)))
}

pub async fn update_food_restrictions(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<FoodRestrictionsRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let patch = ProfilePatch {
        food_restrictions: Some(payload.food_restrictions),
        ..ProfilePatch::default()
    };

    let user = state.store.update_user(auth.user.id, patch).await?;
    Ok(Json(ApiResponse::new(user)))
}

pub async fn my_reservations(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<ApiResponse<Vec<Reservation>>>> {
    let reservations = state.store.reservations_for_user(auth.user.id).await?;
    Ok(Json(ApiResponse::new(reservations)))
}

/// The organizer's own events, newest event date first, inactive included.
pub async fn my_events(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<ApiResponse<Vec<Event>>>> {
    auth.require_organizer()?;

    let mut events = state
        .store
        .events(EventScope::Organizer(auth.user.id))
        .await?;
    events.sort_by(|a, b| {
        b.event_date
            .cmp(&a.event_date)
            .then_with(|| b.start_time.cmp(&a.start_time))
    });

    Ok(Json(ApiResponse::new(events)))
}
