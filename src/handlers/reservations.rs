use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    domain::{Reservation, ReserveOutcome},
    error::{AppError, AppResult},
    models::{ApiResponse, ReserveRequest},
    state::AppState,
    store::StoreError,
};

/// Claims servings of an event. The body is optional and defaults to one
/// serving, whatever content type the client sent with an empty body.
pub async fn reserve_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<Uuid>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<ApiResponse<ReserveOutcome>>)> {
    let request = parse_reserve_body(&body)?;

    let outcome = match state
        .store
        .reserve_event(event_id, auth.user.id, request.servings)
        .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            if matches!(
                err,
                StoreError::InsufficientServings { .. } | StoreError::EventInactive
            ) {
                warn!(
                    user_id = %auth.user.id,
                    %event_id,
                    servings = request.servings,
                    reason = %err,
                    "reservation rejected"
                );
            }
            return Err(err.into());
        }
    };

    info!(
        user_id = %auth.user.id,
        %event_id,
        reservation_id = %outcome.reservation.id,
        servings = request.servings,
        new_quantity_remaining = outcome.new_quantity_remaining,
        "reservation confirmed"
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::new(outcome))))
}

fn parse_reserve_body(body: &[u8]) -> AppResult<ReserveRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ReserveRequest::default());
    }

    serde_json::from_slice(body)
        .map_err(|e| AppError::validation(format!("invalid reservation body: {e}")))
}

pub async fn cancel_reservation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Reservation>>> {
    let reservation = state.store.cancel_reservation(id, auth.user.id).await?;

    info!(
        reservation_id = %id,
        user_id = %auth.user.id,
        event_id = %reservation.event_id,
        servings = reservation.quantity_reserved,
        "reservation cancelled"
    );

    Ok(Json(ApiResponse::new(reservation)))
}
