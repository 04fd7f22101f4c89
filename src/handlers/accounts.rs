use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    domain::{SignUp, User, UserRecord, user::dedup_restrictions, user::normalize_email},
    error::{AppError, AppResult},
    models::{ApiResponse, LoginRequest, SessionPayload},
    state::AppState,
};

const INVALID_CREDENTIALS: &str = "invalid email or password";

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignUp>,
) -> AppResult<(StatusCode, Json<ApiResponse<SessionPayload>>)> {
    let email = payload.validate()?;
    let password_hash = state.passwords.hash(payload.password).await?;

    let now = Utc::now();
    let user = state
        .store
        .insert_user(UserRecord {
            user: User {
                id: Uuid::new_v4(),
                full_name: payload.full_name.trim().to_string(),
                email,
                role: payload.role,
                food_restrictions: dedup_restrictions(payload.food_restrictions),
                created_at: now,
                updated_at: now,
            },
            password_hash,
        })
        .await?;

    let issued = state.sessions.issue(user.id).await;
    info!(user_id = %user.id, role = ?user.role, "account created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(SessionPayload {
            user,
            token: issued.token,
            expires_at: issued.expires_at,
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<SessionPayload>>> {
    let email =
        normalize_email(&payload.email).map_err(|_| AppError::unauthorized(INVALID_CREDENTIALS))?;

    let Some(record) = state.store.user_by_email(&email).await? else {
        warn!("login attempt for unknown email");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    };

    if !state
        .passwords
        .verify(payload.password, record.password_hash)
        .await
    {
        warn!(user_id = %record.user.id, "login attempt with wrong password");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    let issued = state.sessions.issue(record.user.id).await;
    info!(user_id = %record.user.id, "signed in");

    Ok(Json(ApiResponse::new(SessionPayload {
        user: record.user,
        token: issued.token,
        expires_at: issued.expires_at,
    })))
}

pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> StatusCode {
    state.sessions.revoke(&auth.token).await;
    info!(user_id = %auth.user.id, "signed out");
    StatusCode::NO_CONTENT
}
