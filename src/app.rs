use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::{get, patch, post},
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::warn;

use crate::{
    handlers::{
        accounts::{login, logout, signup},
        events::{
            attach_image, create_event, delete_event, event_reservations, event_stats, get_event,
            list_events, patch_event,
        },
        locations::{create_location, list_locations},
        meta::{healthcheck, tag_catalog},
        reservations::{cancel_reservation, reserve_event},
        uploads::upload_image,
        users::{me, my_events, my_reservations, update_food_restrictions, update_me},
    },
    state::AppState,
};

/// Room for multipart framing on top of the image itself.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn build_router(state: AppState, allow_origin: &str) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.images.max_bytes() + MULTIPART_OVERHEAD);
    let uploads = ServeDir::new(state.images.root());

    Router::new()
        .route("/health", get(healthcheck))
        .route("/api/v1/tags", get(tag_catalog))
        .route("/api/v1/auth/signup", post(signup))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/users/me", get(me).patch(update_me))
        .route(
            "/api/v1/users/me/food-restrictions",
            patch(update_food_restrictions).put(update_food_restrictions),
        )
        .route("/api/v1/users/me/reservations", get(my_reservations))
        .route("/api/v1/users/me/events", get(my_events))
        .route("/api/v1/events", get(list_events).post(create_event))
        .route("/api/v1/events/stats", get(event_stats))
        .route(
            "/api/v1/events/{id}",
            get(get_event).patch(patch_event).delete(delete_event),
        )
        .route("/api/v1/events/{id}/reserve", post(reserve_event))
        .route("/api/v1/events/{id}/reservations", get(event_reservations))
        .route(
            "/api/v1/events/{id}/image",
            post(attach_image).layer(upload_limit.clone()),
        )
        .route("/api/v1/reservations/{id}/cancel", post(cancel_reservation))
        .route("/api/v1/locations", get(list_locations).post(create_location))
        .route("/api/v1/uploads", post(upload_image).layer(upload_limit))
        .nest_service("/uploads", uploads)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(allowed_origin(allow_origin))
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ]),
        )
        .with_state(state)
}

fn allowed_origin(origin: &str) -> AllowOrigin {
    let origin = origin.trim();
    if origin == "*" {
        return Any.into();
    }

    match HeaderValue::from_str(origin) {
        Ok(value) => AllowOrigin::exact(value),
        Err(_) => {
            warn!(%origin, "invalid CORS origin, cross-origin requests will be refused");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    }
}
